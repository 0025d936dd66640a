//! 拦截运行时
//!
//! 对外的 Bean 引用入口：按类型 + 限定符（或名称）解析定义，生成代理类，
//! 并按作用域返回合适的引用形态——正常作用域给客户端代理，singleton
//! 给直接持有实例的拦截代理，dependent 给携带自有创建上下文的引用，
//! 引用释放时按逆序销毁 dependent 实例。

use std::sync::Arc;

use parking_lot::Mutex;

use trellis_core::annotation::AnnotationInstance;
use trellis_core::bean::{BeanDefinition, DestroyFn};
use trellis_core::container::BeanManager;
use trellis_core::context::Context;
use trellis_core::creational::CreationalContext;
use trellis_core::error::ContainerResult;
use trellis_core::interception::{Invocable, InvocationResult, MethodArgs};
use trellis_core::metadata::BeanTypeKey;
use trellis_core::scope::ScopeKind;

use crate::normal_scope::{LifecycleCreateFn, NormalScopeProxyFactory};
use crate::proxy::{InterceptorDecoratorProxy, InterceptorDecoratorProxyFactory};
use crate::registry::InterceptorRegistry;
use crate::resolution::{BeanInterceptorInfo, InterceptorResolutionEngine};

/// 拦截运行时
pub struct InterceptionRuntime {
    manager: Arc<BeanManager>,
    engine: InterceptorResolutionEngine,
    proxy_factory: InterceptorDecoratorProxyFactory,
    client_proxies: NormalScopeProxyFactory,
    self_interception_enabled: bool,
}

impl InterceptionRuntime {
    /// 以管理器与注册表构建运行时
    ///
    /// 配置中的启用顺序在此应用；之后注册表只读。
    pub fn new(
        manager: Arc<BeanManager>,
        mut registry: InterceptorRegistry,
    ) -> ContainerResult<Self> {
        let config = manager.config();
        registry.apply_enablement_order(
            &config.enabled_interceptors,
            &config.enabled_decorators,
        )?;
        let self_interception_enabled = config.self_interception_enabled;
        let engine =
            InterceptorResolutionEngine::new(Arc::new(registry), self_interception_enabled);
        tracing::info!(
            "Interception runtime ready (self-interception {})",
            if self_interception_enabled { "on" } else { "off" }
        );
        Ok(Self {
            manager,
            engine,
            proxy_factory: InterceptorDecoratorProxyFactory::new(),
            client_proxies: NormalScopeProxyFactory::new(),
            self_interception_enabled,
        })
    }

    pub fn manager(&self) -> &Arc<BeanManager> {
        &self.manager
    }

    pub fn engine(&self) -> &InterceptorResolutionEngine {
        &self.engine
    }

    /// 按类型 + 限定符取 Bean 引用
    pub fn get_reference(
        &self,
        bean_type: &BeanTypeKey,
        qualifiers: &[AnnotationInstance],
    ) -> ContainerResult<Arc<dyn Invocable>> {
        let definition = self.manager.resolve(bean_type, qualifiers)?;
        self.reference_for(definition)
    }

    /// 按名称取 Bean 引用
    pub fn get_reference_by_name(&self, name: &str) -> ContainerResult<Arc<dyn Invocable>> {
        let definition = self.manager.definition(name)?;
        self.reference_for(definition)
    }

    fn reference_for(
        &self,
        definition: Arc<BeanDefinition>,
    ) -> ContainerResult<Arc<dyn Invocable>> {
        let info = self.engine.resolve(definition.annotated_type());
        let proxy_class = self.proxy_factory.get_or_generate(&definition, &info)?;
        let create = self.lifecycle_create(&definition, &info);
        let destroy = self.lifecycle_destroy(&definition, &info);

        match definition.scope() {
            ScopeKind::Request | ScopeKind::Session | ScopeKind::Application => {
                Ok(self.client_proxies.get_or_create(
                    &definition,
                    self.manager.contexts(),
                    proxy_class,
                    create,
                    destroy,
                ))
            }
            ScopeKind::Singleton => {
                let context = self
                    .manager
                    .contexts()
                    .require_context(ScopeKind::Singleton)?;
                let creator = |creational: &mut CreationalContext| create(creational);
                let instance =
                    context.get_or_create(&definition, &creator, Some(destroy))?;
                Ok(Arc::new(InterceptorDecoratorProxy::new(instance, proxy_class)))
            }
            ScopeKind::Dependent => {
                // 每个注入点一个新实例，创建上下文归引用所有
                let mut creational = CreationalContext::new();
                let instance = create(&mut creational)?;
                Ok(Arc::new(DependentReference {
                    proxy: InterceptorDecoratorProxy::new(instance, proxy_class),
                    creational: Mutex::new(Some(creational)),
                    destroy,
                }))
            }
        }
    }

    /// 包装 post-construct 链的创建闭包：自回调在前，CDI 生命周期
    /// 拦截器在后
    fn lifecycle_create(
        &self,
        definition: &Arc<BeanDefinition>,
        info: &Arc<BeanInterceptorInfo>,
    ) -> LifecycleCreateFn {
        let manager = Arc::clone(&self.manager);
        let definition = Arc::clone(definition);
        let info = Arc::clone(info);
        let self_enabled = self.self_interception_enabled;
        Arc::new(move |creational| {
            let instance = manager.create_guarded(&definition, creational)?;
            if self_enabled {
                for callback in &definition.annotated_type().self_interception().post_construct {
                    callback(instance.as_ref());
                }
            }
            for interceptor in info.post_construct_interceptors() {
                interceptor.post_construct(instance.as_ref());
            }
            Ok(instance)
        })
    }

    /// 包装 pre-destroy 链的销毁回调，最后执行定义自身的销毁回调
    fn lifecycle_destroy(
        &self,
        definition: &Arc<BeanDefinition>,
        info: &Arc<BeanInterceptorInfo>,
    ) -> DestroyFn {
        let definition = Arc::clone(definition);
        let info = Arc::clone(info);
        let self_enabled = self.self_interception_enabled;
        Arc::new(move |instance| {
            if self_enabled {
                for callback in &definition.annotated_type().self_interception().pre_destroy {
                    callback(instance.as_ref());
                }
            }
            for interceptor in info.pre_destroy_interceptors() {
                interceptor.pre_destroy(instance.as_ref());
            }
            if let Some(callback) = definition.destroy_callback() {
                callback(instance);
            }
        })
    }
}

/// dependent 伪作用域的引用
///
/// 持有自己的创建上下文；引用被丢弃时先跑 pre-destroy，再按创建
/// 逆序释放 dependent 实例。
pub struct DependentReference {
    proxy: InterceptorDecoratorProxy,
    creational: Mutex<Option<CreationalContext>>,
    destroy: DestroyFn,
}

impl Invocable for DependentReference {
    fn invoke(&self, method: &str, args: MethodArgs) -> InvocationResult {
        self.proxy.invoke(method, args)
    }

    fn is_intercepted_proxy(&self) -> bool {
        true
    }
}

impl Drop for DependentReference {
    fn drop(&mut self) {
        (self.destroy)(self.proxy.target());
        if let Some(mut creational) = self.creational.lock().take() {
            creational.release();
        }
    }
}
