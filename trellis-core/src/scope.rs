//! Bean 的作用域
//!
//! 正常作用域（request/session/application）的 Bean 通过客户端代理注入，
//! 每次调用重新解析当前上下文中的实例；伪作用域（dependent/singleton）
//! 直接持有实例引用。

use serde::{Deserialize, Serialize};

/// 作用域种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// 依赖伪作用域 - 每个注入点创建新实例，从不缓存
    Dependent,

    /// 请求作用域 - 以调用线程为边界
    Request,

    /// 会话作用域 - 以显式会话 id 为边界
    Session,

    /// 应用作用域 - 进程级，容器生命周期内唯一
    Application,

    /// 单例伪作用域 - 进程级，不经客户端代理
    Singleton,
}

impl ScopeKind {
    /// 是否为正常作用域（需要客户端代理）
    pub fn is_normal(&self) -> bool {
        matches!(
            self,
            ScopeKind::Request | ScopeKind::Session | ScopeKind::Application
        )
    }

    /// 是否为伪作用域
    pub fn is_pseudo(&self) -> bool {
        !self.is_normal()
    }
}

impl Default for ScopeKind {
    fn default() -> Self {
        ScopeKind::Dependent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_scopes_require_client_proxies() {
        assert!(ScopeKind::Request.is_normal());
        assert!(ScopeKind::Session.is_normal());
        assert!(ScopeKind::Application.is_normal());
        assert!(!ScopeKind::Dependent.is_normal());
        assert!(!ScopeKind::Singleton.is_normal());
    }

    #[test]
    fn test_default_scope_is_dependent() {
        assert_eq!(ScopeKind::default(), ScopeKind::Dependent);
    }
}
