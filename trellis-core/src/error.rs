//! 统一的错误类型
//!
//! 容器错误分为四类：
//! - 定义错误（Definition）：启动期发现的非法声明，中止容器启动
//! - 解析错误（Resolution）：注入点的歧义或无匹配，首次使用时报告
//! - 调用错误（Invocation）：业务方法抛出的异常，原样向调用方传播
//! - 容器内部错误（Internal）：反射/代理生成等失败，与业务异常区分

use thiserror::Error;

use crate::scope::ScopeKind;

/// 容器级错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 非法的 Bean/拦截器/装饰器声明，启动期检测，不可恢复
    #[error("definition error: {0}")]
    Definition(String),

    /// 同名 Bean 重复注册
    #[error("bean '{0}' already exists")]
    BeanAlreadyExists(String),

    /// 按名称查找失败
    #[error("bean '{0}' not found")]
    BeanNotFound(String),

    /// 无匹配的 Bean
    #[error("unsatisfied resolution for type '{bean_type}' with qualifiers [{qualifiers}]")]
    UnsatisfiedResolution {
        bean_type: String,
        qualifiers: String,
    },

    /// 多个 Bean 同时匹配
    #[error("ambiguous resolution for type '{bean_type}': candidates [{candidates}]")]
    AmbiguousResolution {
        bean_type: String,
        candidates: String,
    },

    /// 目标作用域的上下文当前不活跃
    #[error("context for scope {0:?} is not active")]
    ContextNotActive(ScopeKind),

    /// Bean 实例化失败
    #[error("bean creation failed: {0}")]
    BeanCreationFailed(String),

    /// 创建过程中检测到循环依赖
    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    /// 代理类生成失败
    #[error("proxy generation failed: {0}")]
    ProxyGenerationFailed(String),

    /// 配置已冻结，不再接受注册
    #[error("configuration is frozen, no further registration is allowed")]
    ConfigurationFrozen,

    /// 配置加载失败
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 其他内部错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 方法调用期错误
///
/// 区分「业务代码抛出」与「容器自身故障」：业务异常沿 `proceed()`
/// 链原样传播，容器内部失败（反射访问、代理派发）统一为 `Container`。
#[derive(Debug, Error)]
pub enum InvocationError {
    /// 目标方法或拦截器抛出的业务异常，容器不包装、不重试
    #[error(transparent)]
    Business(anyhow::Error),

    /// 容器内部失败（派发表缺失、降转失败等）
    #[error("container failure during invocation: {0}")]
    Container(String),
}

impl InvocationError {
    /// 包装一个业务异常
    pub fn business<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        InvocationError::Business(anyhow::Error::new(err))
    }

    /// 以消息构造业务异常
    pub fn business_msg(msg: impl Into<String>) -> Self {
        InvocationError::Business(anyhow::anyhow!(msg.into()))
    }

    /// 是否为容器内部失败
    pub fn is_container_failure(&self) -> bool {
        matches!(self, InvocationError::Container(_))
    }
}
