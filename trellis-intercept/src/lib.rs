//! Trellis Intercept - 拦截器与装饰器支持
//!
//! 在 trellis-core 的 SPI 之上提供完整的拦截运行时：
//! - 拦截器/装饰器的启用、定义期校验与顺序管理
//! - 按绑定子集匹配的解析引擎（含自拦截与生命周期链）
//! - 代理类生成与（BeanId, 方法集签名）键的缓存
//! - proceed() 语义的派发链与正常作用域客户端代理

pub mod handler;
pub mod normal_scope;
pub mod proxy;
pub mod registry;
pub mod resolution;
pub mod runtime;

// 重新导出核心类型
pub use normal_scope::{ClientProxy, LifecycleCreateFn, NormalScopeProxyFactory};
pub use proxy::{
    InterceptorDecoratorProxy, InterceptorDecoratorProxyFactory, MethodDispatch, ProxyClass,
};
pub use registry::{
    get_all_decorator_registrations, get_all_interceptor_registrations, DecoratorDefinition,
    DecoratorRegistration, InterceptorDefinition, InterceptorRegistration, InterceptorRegistry,
};
pub use resolution::{BeanInterceptorInfo, InterceptorResolutionEngine, MethodChains};
pub use runtime::{DependentReference, InterceptionRuntime};

// 导出 inventory 供注册宏使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::normal_scope::{ClientProxy, NormalScopeProxyFactory};
    pub use crate::proxy::{InterceptorDecoratorProxy, InterceptorDecoratorProxyFactory, ProxyClass};
    pub use crate::registry::{DecoratorDefinition, InterceptorDefinition, InterceptorRegistry};
    pub use crate::resolution::{BeanInterceptorInfo, InterceptorResolutionEngine};
    pub use crate::runtime::InterceptionRuntime;
    pub use trellis_core::prelude::*;
}
