//! 拦截器/装饰器解析引擎
//!
//! 对单个 Bean 的元数据计算 `BeanInterceptorInfo`：适用的拦截器与
//! 装饰器的有序列表，以及每个业务方法的具体子链（自拦截、CDI 拦截器、
//! 装饰器）。解析结果以（类型名, 方法集签名）为键缓存，同一键的重复
//! 解析返回同一份 `Arc`。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use trellis_core::interception::{Decorator, InterceptionType, Interceptor};
use trellis_core::metadata::{AnnotatedType, MethodKind};

use crate::registry::InterceptorRegistry;

/// 单个业务方法的拦截链
pub struct MethodChains {
    /// 自拦截 around-invoke 是否参与本方法
    pub self_intercepted: bool,
    /// 按启用顺序排列的 CDI 拦截器
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    /// 按启用顺序排列、覆盖本方法的装饰器
    pub decorators: Vec<Arc<dyn Decorator>>,
}

impl MethodChains {
    pub fn is_intercepted(&self) -> bool {
        self.self_intercepted || !self.interceptors.is_empty() || !self.decorators.is_empty()
    }
}

/// 一个 Bean 类型的完整解析结果
pub struct BeanInterceptorInfo {
    type_name: String,
    signature: String,
    methods: HashMap<String, MethodChains>,
    post_construct: Vec<Arc<dyn Interceptor>>,
    pre_destroy: Vec<Arc<dyn Interceptor>>,
    around_timeout: Vec<Arc<dyn Interceptor>>,
}

impl BeanInterceptorInfo {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 方法集签名（缓存键的一部分）
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn method_chains(&self, method: &str) -> Option<&MethodChains> {
        self.methods.get(method)
    }

    /// 适用于本 Bean 的 post-construct 生命周期拦截器
    pub fn post_construct_interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.post_construct
    }

    /// 适用于本 Bean 的 pre-destroy 生命周期拦截器
    pub fn pre_destroy_interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.pre_destroy
    }

    /// 适用于本 Bean 的 around-timeout 拦截器
    ///
    /// 容器自身不提供定时器服务，链由外部定时器派发。
    pub fn around_timeout_interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.around_timeout
    }

    /// 任一业务方法被拦截即需要生成拦截代理
    pub fn requires_proxy(&self) -> bool {
        self.methods.values().any(|c| c.is_intercepted())
    }

    /// 被拦截的方法数（诊断用）
    pub fn intercepted_method_count(&self) -> usize {
        self.methods.values().filter(|c| c.is_intercepted()).count()
    }
}

/// 解析引擎
pub struct InterceptorResolutionEngine {
    registry: Arc<InterceptorRegistry>,
    self_interception_enabled: bool,
    cache: RwLock<HashMap<(String, String), Arc<BeanInterceptorInfo>>>,
}

impl InterceptorResolutionEngine {
    pub fn new(registry: Arc<InterceptorRegistry>, self_interception_enabled: bool) -> Self {
        Self {
            registry,
            self_interception_enabled,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 解析一个 Bean 类型
    ///
    /// 同一（类型名, 方法集签名）的重复解析命中缓存，返回同一份结果。
    pub fn resolve(&self, ty: &Arc<AnnotatedType>) -> Arc<BeanInterceptorInfo> {
        let key = (
            ty.name().to_string(),
            ty.method_set_signature().to_string(),
        );
        if let Some(info) = self.cache.read().get(&key) {
            return Arc::clone(info);
        }

        let info = Arc::new(self.compute(ty));
        let mut cache = self.cache.write();
        // 并发解析同一类型：先写入者胜出
        Arc::clone(cache.entry(key).or_insert(info))
    }

    fn compute(&self, ty: &Arc<AnnotatedType>) -> BeanInterceptorInfo {
        let self_intercepted =
            self.self_interception_enabled && !ty.self_interception().around_invoke.is_empty();

        let mut methods = HashMap::new();
        for method in ty.methods() {
            // 合成方法与序列化钩子永不进入拦截集
            if method.kind() != MethodKind::Business {
                continue;
            }

            let merged = ty.merged_bindings_for(method);
            let interceptors: Vec<Arc<dyn Interceptor>> = self
                .registry
                .interceptors()
                .iter()
                .filter(|d| d.handles(InterceptionType::AroundInvoke) && d.matches(&merged))
                .map(|d| Arc::clone(d.interceptor()))
                .collect();

            let decorators: Vec<Arc<dyn Decorator>> = self
                .registry
                .decorators()
                .iter()
                .filter(|d| d.applies_to(ty.type_closure()) && d.decorates_method(method.name()))
                .map(|d| Arc::clone(d.decorator()))
                .collect();

            methods.insert(
                method.name().to_string(),
                MethodChains {
                    self_intercepted,
                    interceptors,
                    decorators,
                },
            );
        }

        // 生命周期链按类级绑定匹配
        let class_bindings = ty.effective_class_bindings();
        let post_construct: Vec<Arc<dyn Interceptor>> = self
            .registry
            .interceptors()
            .iter()
            .filter(|d| d.handles(InterceptionType::PostConstruct) && d.matches(class_bindings))
            .map(|d| Arc::clone(d.interceptor()))
            .collect();
        let pre_destroy: Vec<Arc<dyn Interceptor>> = self
            .registry
            .interceptors()
            .iter()
            .filter(|d| d.handles(InterceptionType::PreDestroy) && d.matches(class_bindings))
            .map(|d| Arc::clone(d.interceptor()))
            .collect();
        let around_timeout: Vec<Arc<dyn Interceptor>> = self
            .registry
            .interceptors()
            .iter()
            .filter(|d| d.handles(InterceptionType::AroundTimeout) && d.matches(class_bindings))
            .map(|d| Arc::clone(d.interceptor()))
            .collect();

        let info = BeanInterceptorInfo {
            type_name: ty.name().to_string(),
            signature: ty.method_set_signature().to_string(),
            methods,
            post_construct,
            pre_destroy,
            around_timeout,
        };
        tracing::debug!(
            "Resolved interceptors for '{}': {}/{} method(s) intercepted",
            info.type_name,
            info.intercepted_method_count(),
            info.methods.len()
        );
        info
    }

    /// 缓存中的条目数（诊断用）
    pub fn cache_size(&self) -> usize {
        self.cache.read().len()
    }
}
