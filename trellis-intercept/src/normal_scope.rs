//! 正常作用域的客户端代理
//!
//! 注入点拿到的是稳定的 `ClientProxy` 引用；每次方法调用时代理才解析
//! 当前活跃上下文中的 contextual 实例并转发。上下文结束重启后，同一个
//! 代理引用指向新的底层实例。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use trellis_core::bean::{BeanDefinition, BeanId, BeanInstance, DestroyFn};
use trellis_core::context::{Context, ContextsService};
use trellis_core::creational::CreationalContext;
use trellis_core::error::{ContainerResult, InvocationError};
use trellis_core::interception::{Invocable, InvocationResult, MethodArgs};

use crate::proxy::ProxyClass;

/// 带生命周期回调的创建闭包（由运行时包装 post-construct 链）
pub type LifecycleCreateFn =
    Arc<dyn Fn(&mut CreationalContext) -> ContainerResult<BeanInstance> + Send + Sync>;

/// 正常作用域的客户端代理
pub struct ClientProxy {
    definition: Arc<BeanDefinition>,
    contexts: Arc<ContextsService>,
    proxy_class: Arc<ProxyClass>,
    create: LifecycleCreateFn,
    destroy: DestroyFn,
}

impl ClientProxy {
    pub fn new(
        definition: Arc<BeanDefinition>,
        contexts: Arc<ContextsService>,
        proxy_class: Arc<ProxyClass>,
        create: LifecycleCreateFn,
        destroy: DestroyFn,
    ) -> Self {
        Self {
            definition,
            contexts,
            proxy_class,
            create,
            destroy,
        }
    }

    pub fn bean_name(&self) -> &str {
        self.definition.name()
    }

    /// 解析当前上下文中的 contextual 实例
    ///
    /// 上下文不活跃时报错，调用方据此看到 `Container` 级失败而不是
    /// 悬空引用。
    pub fn current_instance(&self) -> ContainerResult<BeanInstance> {
        let context = self.contexts.require_context(self.definition.scope())?;
        let create = |creational: &mut CreationalContext| (self.create)(creational);
        context.get_or_create(&self.definition, &create, Some(Arc::clone(&self.destroy)))
    }
}

impl Invocable for ClientProxy {
    fn invoke(&self, method: &str, args: MethodArgs) -> InvocationResult {
        let instance = self
            .current_instance()
            .map_err(|e| InvocationError::Container(e.to_string()))?;
        self.proxy_class.dispatch(&instance, method, args)
    }

    fn is_client_proxy(&self) -> bool {
        true
    }
}

/// 客户端代理工厂（按 BeanId 缓存）
///
/// 同一 Bean 的所有注入点共享同一个代理对象。
pub struct NormalScopeProxyFactory {
    cache: RwLock<HashMap<BeanId, Arc<ClientProxy>>>,
}

impl NormalScopeProxyFactory {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_create(
        &self,
        definition: &Arc<BeanDefinition>,
        contexts: &Arc<ContextsService>,
        proxy_class: Arc<ProxyClass>,
        create: LifecycleCreateFn,
        destroy: DestroyFn,
    ) -> Arc<ClientProxy> {
        if let Some(proxy) = self.cache.read().get(&definition.id()) {
            return Arc::clone(proxy);
        }

        let proxy = Arc::new(ClientProxy::new(
            Arc::clone(definition),
            Arc::clone(contexts),
            proxy_class,
            create,
            destroy,
        ));
        let mut cache = self.cache.write();
        Arc::clone(cache.entry(definition.id()).or_insert(proxy))
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for NormalScopeProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}
