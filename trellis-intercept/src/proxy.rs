//! 拦截/装饰代理
//!
//! `ProxyClass` 是代理的「类级」产物：每个方法一个派发槽，未被拦截的
//! 方法直通真实方法体，被拦截的方法走派发链。生成结果以（类型名,
//! 方法集签名）为键缓存：等价的注解类型共享同一份代理类，即使分属
//! 不同的 Bean 定义。
//!
//! `InterceptorDecoratorProxy` 是绑定了具体目标实例的代理对象。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use trellis_core::bean::{BeanDefinition, BeanInstance};
use trellis_core::error::{ContainerError, ContainerResult, InvocationError};
use trellis_core::interception::{Invocable, InvocationResult, MethodArgs};
use trellis_core::metadata::{AnnotatedType, MethodKind};

use crate::handler;
use crate::resolution::BeanInterceptorInfo;

/// 单个方法的派发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodDispatch {
    /// 直通真实方法体，无拦截开销
    Direct,
    /// 经拦截器/装饰器链派发
    Intercepted,
}

/// 一个注解类型的代理类
pub struct ProxyClass {
    annotated_type: Arc<AnnotatedType>,
    info: Arc<BeanInterceptorInfo>,
    dispatch: HashMap<String, MethodDispatch>,
}

impl ProxyClass {
    /// 为一个 Bean 定义生成代理类
    ///
    /// 合成方法与序列化钩子一律直通；目标类已自带的序列化钩子不再
    /// 重复生成，直接复用其方法体。
    pub fn generate(
        definition: &BeanDefinition,
        info: Arc<BeanInterceptorInfo>,
    ) -> ContainerResult<Self> {
        let ty = Arc::clone(definition.annotated_type());
        let mut dispatch = HashMap::with_capacity(ty.methods().len());

        for method in ty.methods() {
            let slot = match method.kind() {
                MethodKind::Business => {
                    let intercepted = info
                        .method_chains(method.name())
                        .ok_or_else(|| {
                            ContainerError::ProxyGenerationFailed(format!(
                                "no resolution entry for method '{}::{}'",
                                ty.name(),
                                method.name()
                            ))
                        })?
                        .is_intercepted();
                    if intercepted {
                        MethodDispatch::Intercepted
                    } else {
                        MethodDispatch::Direct
                    }
                }
                MethodKind::Synthetic | MethodKind::SerializationHook => MethodDispatch::Direct,
            };
            if dispatch.insert(method.name().to_string(), slot).is_some() {
                return Err(ContainerError::ProxyGenerationFailed(format!(
                    "duplicate method '{}' on '{}'",
                    method.name(),
                    ty.name()
                )));
            }
        }

        tracing::debug!(
            "Generated proxy class for '{}' ({} slot(s), {} intercepted)",
            ty.name(),
            dispatch.len(),
            info.intercepted_method_count()
        );
        Ok(Self {
            annotated_type: ty,
            info,
            dispatch,
        })
    }

    pub fn annotated_type(&self) -> &Arc<AnnotatedType> {
        &self.annotated_type
    }

    pub fn info(&self) -> &Arc<BeanInterceptorInfo> {
        &self.info
    }

    pub fn dispatch_for(&self, method: &str) -> Option<MethodDispatch> {
        self.dispatch.get(method).copied()
    }

    /// 在给定目标实例上派发一次调用
    pub fn dispatch(
        &self,
        target: &BeanInstance,
        method: &str,
        args: MethodArgs,
    ) -> InvocationResult {
        let slot = self.dispatch_for(method).ok_or_else(|| {
            InvocationError::Container(format!(
                "no dispatch slot for method '{}::{}'",
                self.annotated_type.name(),
                method
            ))
        })?;
        let business = self.annotated_type.method(method).ok_or_else(|| {
            InvocationError::Container(format!(
                "method '{}::{}' has a slot but no body",
                self.annotated_type.name(),
                method
            ))
        })?;

        match slot {
            MethodDispatch::Direct => (business.body())(target.as_ref(), args),
            MethodDispatch::Intercepted => {
                let chains = self.info.method_chains(method).ok_or_else(|| {
                    InvocationError::Container(format!(
                        "intercepted method '{}::{}' lost its chains",
                        self.annotated_type.name(),
                        method
                    ))
                })?;
                handler::invoke_intercepted(
                    &self.annotated_type,
                    chains,
                    target.as_ref(),
                    business,
                    args,
                )
            }
        }
    }
}

/// 代理类缓存键
///
/// 按注解类型而不是 Bean 定义：等价的类型共享一份代理类。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProxyClassKey {
    type_name: String,
    signature: String,
}

/// 代理类工厂（带缓存）
pub struct InterceptorDecoratorProxyFactory {
    cache: RwLock<HashMap<ProxyClassKey, Arc<ProxyClass>>>,
}

impl InterceptorDecoratorProxyFactory {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 取出或生成代理类
    ///
    /// 幂等：同一（类型名, 方法集签名）返回同一份 `Arc`，并发首次
    /// 请求也只保留一份。分别构造但等价的注解类型命中同一键。
    pub fn get_or_generate(
        &self,
        definition: &BeanDefinition,
        info: &Arc<BeanInterceptorInfo>,
    ) -> ContainerResult<Arc<ProxyClass>> {
        let key = ProxyClassKey {
            type_name: definition.annotated_type().name().to_string(),
            signature: definition.annotated_type().method_set_signature().to_string(),
        };
        if let Some(proxy_class) = self.cache.read().get(&key) {
            return Ok(Arc::clone(proxy_class));
        }

        let generated = Arc::new(ProxyClass::generate(definition, Arc::clone(info))?);
        let mut cache = self.cache.write();
        // 并发生成竞争：先写入者胜出
        Ok(Arc::clone(cache.entry(key).or_insert(generated)))
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for InterceptorDecoratorProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// 绑定了目标实例的拦截/装饰代理
pub struct InterceptorDecoratorProxy {
    target: BeanInstance,
    proxy_class: Arc<ProxyClass>,
}

impl InterceptorDecoratorProxy {
    pub fn new(target: BeanInstance, proxy_class: Arc<ProxyClass>) -> Self {
        Self {
            target,
            proxy_class,
        }
    }

    pub fn target(&self) -> &BeanInstance {
        &self.target
    }

    pub fn proxy_class(&self) -> &Arc<ProxyClass> {
        &self.proxy_class
    }
}

impl Invocable for InterceptorDecoratorProxy {
    fn invoke(&self, method: &str, args: MethodArgs) -> InvocationResult {
        self.proxy_class.dispatch(&self.target, method, args)
    }

    fn is_intercepted_proxy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use trellis_core::annotation::{AnnotationInstance, AnnotationType, BindingSet};
    use trellis_core::bean::CreateFn;
    use trellis_core::interception::{Interceptor, InvocationContext, MethodBody};
    use trellis_core::scope::ScopeKind;

    use crate::registry::{InterceptorDefinition, InterceptorRegistry};
    use crate::resolution::InterceptorResolutionEngine;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Interceptor for Counting {
        fn name(&self) -> &str {
            "Counting"
        }
        fn around_invoke(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult {
            self.calls.fetch_add(1, Ordering::Relaxed);
            ctx.proceed()
        }
    }

    fn unit_create() -> CreateFn {
        Arc::new(|_| Ok(Arc::new(()) as BeanInstance))
    }

    fn const_body(value: i32) -> MethodBody {
        Arc::new(move |_target, _args| Ok(Box::new(value)))
    }

    fn engine_with_counting(calls: Arc<AtomicUsize>) -> InterceptorResolutionEngine {
        let tx = AnnotationType::new("Transactional");
        let mut registry = InterceptorRegistry::new();
        registry
            .enable_interceptor(
                InterceptorDefinition::new(
                    "Counting",
                    BindingSet::from_iter([AnnotationInstance::of(&tx)]),
                    Arc::new(Counting { calls }),
                )
                .unwrap(),
            )
            .unwrap();
        InterceptorResolutionEngine::new(Arc::new(registry), true)
    }

    fn bean_with_methods(name: &str, business: &[&str], bound: &[&str]) -> BeanDefinition {
        let tx = AnnotationType::new("Transactional");
        let mut builder = AnnotatedType::builder(name).scope(ScopeKind::Application);
        for (i, method) in business.iter().enumerate() {
            let bindings = if bound.contains(method) {
                BindingSet::from_iter([AnnotationInstance::of(&tx)])
            } else {
                BindingSet::new()
            };
            builder = builder.business_method(*method, bindings, const_body(i as i32));
        }
        BeanDefinition::new(
            name.to_string(),
            builder.build(),
            unit_create(),
        )
    }

    #[test]
    fn test_mixed_dispatch_direct_and_intercepted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with_counting(Arc::clone(&calls));
        let bean = bean_with_methods("Mixed", &["plain", "wrapped"], &["wrapped"]);
        let info = engine.resolve(bean.annotated_type());

        let factory = InterceptorDecoratorProxyFactory::new();
        let proxy_class = factory.get_or_generate(&bean, &info).unwrap();
        assert_eq!(
            proxy_class.dispatch_for("plain"),
            Some(MethodDispatch::Direct)
        );
        assert_eq!(
            proxy_class.dispatch_for("wrapped"),
            Some(MethodDispatch::Intercepted)
        );

        let target: BeanInstance = Arc::new(());
        let proxy = InterceptorDecoratorProxy::new(target, proxy_class);
        proxy.invoke("plain", vec![]).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        proxy.invoke("wrapped", vec![]).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(proxy.is_intercepted_proxy());
    }

    #[test]
    fn test_chain_count_matches_methods_times_interceptors() {
        // 七个业务方法、一个匹配的类级拦截器：每个方法恰好一条链
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with_counting(Arc::clone(&calls));

        let methods = ["m1", "m2", "m3", "m4", "m5", "m6", "m7"];
        let bean = bean_with_methods("Seven", &methods, &methods);
        let info = engine.resolve(bean.annotated_type());
        assert_eq!(info.intercepted_method_count(), 7);

        let factory = InterceptorDecoratorProxyFactory::new();
        let proxy_class = factory.get_or_generate(&bean, &info).unwrap();
        let proxy = InterceptorDecoratorProxy::new(Arc::new(()), proxy_class);
        for method in methods {
            proxy.invoke(method, vec![]).unwrap();
        }
        assert_eq!(calls.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_proxy_class_cache_is_idempotent() {
        let engine = engine_with_counting(Arc::new(AtomicUsize::new(0)));
        let bean = bean_with_methods("Cached", &["work"], &["work"]);
        let info = engine.resolve(bean.annotated_type());

        let factory = InterceptorDecoratorProxyFactory::new();
        let first = factory.get_or_generate(&bean, &info).unwrap();
        let second = factory.get_or_generate(&bean, &info).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cache_size(), 1);
    }

    #[test]
    fn test_equivalent_annotated_types_share_one_proxy_class() {
        // 两个分别构造但等价的定义（同类型名、同方法集）共享一份代理类
        let engine = engine_with_counting(Arc::new(AtomicUsize::new(0)));
        let first_bean = bean_with_methods("Equivalent", &["work"], &["work"]);
        let second_bean = bean_with_methods("Equivalent", &["work"], &["work"]);
        assert_ne!(first_bean.id(), second_bean.id());

        let factory = InterceptorDecoratorProxyFactory::new();
        let first = factory
            .get_or_generate(&first_bean, &engine.resolve(first_bean.annotated_type()))
            .unwrap();
        let second = factory
            .get_or_generate(&second_bean, &engine.resolve(second_bean.annotated_type()))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cache_size(), 1);
    }

    #[test]
    fn test_concurrent_first_generation_yields_one_class() {
        let engine = engine_with_counting(Arc::new(AtomicUsize::new(0)));
        let bean = Arc::new(bean_with_methods("Racy", &["work"], &["work"]));
        let info = engine.resolve(bean.annotated_type());
        let factory = Arc::new(InterceptorDecoratorProxyFactory::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let factory = Arc::clone(&factory);
            let bean = Arc::clone(&bean);
            let info = Arc::clone(&info);
            handles.push(std::thread::spawn(move || {
                let proxy_class = factory.get_or_generate(&bean, &info).unwrap();
                Arc::as_ptr(&proxy_class) as usize
            }));
        }
        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(factory.cache_size(), 1);
    }

    #[test]
    fn test_many_methods_generate_in_one_pass() {
        // 大方法集（>130）也必须一次生成成功并全部可派发
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with_counting(Arc::clone(&calls));

        let names: Vec<String> = (0..140).map(|i| format!("op{:03}", i)).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let bean = bean_with_methods("Wide", &name_refs, &name_refs);
        let info = engine.resolve(bean.annotated_type());

        let factory = InterceptorDecoratorProxyFactory::new();
        let proxy_class = factory.get_or_generate(&bean, &info).unwrap();
        let proxy = InterceptorDecoratorProxy::new(Arc::new(()), proxy_class);
        for name in &names {
            proxy.invoke(name, vec![]).unwrap();
        }
        assert_eq!(calls.load(Ordering::Relaxed), 140);
    }

    #[test]
    fn test_unknown_method_is_container_failure() {
        let engine = engine_with_counting(Arc::new(AtomicUsize::new(0)));
        let bean = bean_with_methods("Narrow", &["work"], &[]);
        let info = engine.resolve(bean.annotated_type());

        let factory = InterceptorDecoratorProxyFactory::new();
        let proxy_class = factory.get_or_generate(&bean, &info).unwrap();
        let proxy = InterceptorDecoratorProxy::new(Arc::new(()), proxy_class);
        let err = proxy.invoke("missing", vec![]).unwrap_err();
        assert!(err.is_container_failure());
    }
}
