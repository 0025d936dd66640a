// trellis-core: 上下文化依赖注入容器的核心
//
// 提供 contextual 实例管理，支持：
// - 正常作用域（request/session/application/singleton）与 dependent 伪作用域
// - 限定符（qualifier）驱动的类型安全解析
// - 构造型（stereotype）的作用域默认值与拦截器绑定传递
// - 创建上下文（CreationalContext）与 dependent 实例的逆序销毁
// - 拦截器/装饰器 SPI（解析与派发在 trellis-intercept 中）

pub mod annotation;
pub mod bean;
pub mod config;
pub mod container;
pub mod context;
pub mod creational;
pub mod error;
pub mod interception;
pub mod logging;
pub mod metadata;
pub mod scope;
pub mod utils;

// 重新导出常用类型
pub use annotation::{
    default_qualifier, AnnotationInstance, AnnotationType, BindingSet, MemberValue, Stereotype,
    StereotypeBuilder,
};
pub use bean::{BeanDefinition, BeanId, BeanInstance, CreateFn, DestroyFn};
pub use config::{ContainerConfig, LoggingSection};
pub use container::{BeanManager, BeanManagerBuilder};
pub use context::{Context, ContextState, ContextsService, DefaultContext, InstanceCreator};
pub use creational::CreationalContext;
pub use error::{ContainerError, ContainerResult, InvocationError};
pub use interception::{
    AroundInvokeFn, Decorator, Delegate, InterceptionType, Interceptor, InvocationContext,
    InvocationResult, Invocable, LifecycleFn, MethodArgs, MethodBody,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metadata::{
    AnnotatedType, AnnotatedTypeBuilder, BeanTypeKey, BusinessMethod, MethodKind, TypeKind,
};
pub use scope::ScopeKind;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::annotation::{
        default_qualifier, AnnotationInstance, AnnotationType, BindingSet, Stereotype,
    };
    pub use crate::bean::{BeanDefinition, BeanId, BeanInstance, CreateFn};
    pub use crate::config::ContainerConfig;
    pub use crate::container::{BeanManager, BeanManagerBuilder};
    pub use crate::context::{Context, ContextsService, DefaultContext};
    pub use crate::creational::CreationalContext;
    pub use crate::error::{ContainerError, ContainerResult, InvocationError};
    pub use crate::interception::{
        Decorator, Delegate, Interceptor, InvocationContext, InvocationResult, Invocable,
        MethodArgs,
    };
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::metadata::{AnnotatedType, BeanTypeKey};
    pub use crate::scope::ScopeKind;
    pub use crate::utils;
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context as AnyhowContext};
}
