//! 拦截器/装饰器注册表
//!
//! 负责管理启用的拦截器与装饰器：定义期校验、启用顺序，以及通过
//! inventory 的自动收集。注册表冻结后供解析引擎只读使用。

use std::collections::HashSet;
use std::sync::Arc;

use trellis_core::annotation::BindingSet;
use trellis_core::error::{ContainerError, ContainerResult};
use trellis_core::interception::{Decorator, InterceptionType, Interceptor};
use trellis_core::metadata::BeanTypeKey;

/// 已启用拦截器的定义
pub struct InterceptorDefinition {
    name: String,
    bindings: BindingSet,
    priority: i32,
    interceptor: Arc<dyn Interceptor>,
}

impl InterceptorDefinition {
    /// 定义一个拦截器
    ///
    /// 拦截器必须声明至少一个绑定，否则它永远不会被选中——这是
    /// 定义错误而不是静默的空操作。优先级默认 0。
    pub fn new(
        name: impl Into<String>,
        bindings: BindingSet,
        interceptor: Arc<dyn Interceptor>,
    ) -> ContainerResult<Self> {
        let name = name.into();
        if bindings.is_empty() {
            return Err(ContainerError::Definition(format!(
                "interceptor '{}' declares no interceptor bindings",
                name
            )));
        }
        Ok(Self {
            name,
            bindings,
            priority: 0,
            interceptor,
        })
    }

    /// 设置优先级（升序，数值小者在链上更外层）
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }

    /// 本拦截器是否适用于给定的合并绑定集
    ///
    /// 匹配规则：拦截器声明的全部绑定都出现在合并集内（成员值参与
    /// 比较，标注为 non-binding 的成员除外）。
    pub fn matches(&self, merged: &BindingSet) -> bool {
        self.bindings.is_subset_of(merged)
    }

    pub fn handles(&self, ty: InterceptionType) -> bool {
        self.interceptor.intercepts().contains(&ty)
    }
}

impl std::fmt::Debug for InterceptorDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorDefinition")
            .field("name", &self.name)
            .field("bindings", &self.bindings)
            .field("priority", &self.priority)
            .finish()
    }
}

/// 已启用装饰器的定义
pub struct DecoratorDefinition {
    name: String,
    delegate_type: BeanTypeKey,
    decorated_types: Vec<BeanTypeKey>,
    priority: i32,
    decorator: Arc<dyn Decorator>,
}

impl DecoratorDefinition {
    /// 定义一个装饰器
    ///
    /// 定义期校验：委托类型必须是接口，且必须出现在被装饰类型集内。
    /// 不满足即报定义错误，容器启动中止。不覆盖任何方法的装饰器
    /// （如只覆盖部分接口的抽象装饰器）是合法的，在链上对所有方法
    /// 透明。优先级默认 0。
    pub fn new(
        name: impl Into<String>,
        delegate_type: BeanTypeKey,
        decorated_types: Vec<BeanTypeKey>,
        decorator: Arc<dyn Decorator>,
    ) -> ContainerResult<Self> {
        let name = name.into();
        if !delegate_type.is_interface() {
            return Err(ContainerError::Definition(format!(
                "decorator '{}' declares delegate type '{}' which is not an interface",
                name,
                delegate_type.name()
            )));
        }
        if !decorated_types.contains(&delegate_type) {
            return Err(ContainerError::Definition(format!(
                "decorator '{}' delegate type '{}' is not among its decorated types",
                name,
                delegate_type.name()
            )));
        }
        Ok(Self {
            name,
            delegate_type,
            decorated_types,
            priority: 0,
            decorator,
        })
    }

    /// 设置优先级（升序，数值小者最先执行）
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delegate_type(&self) -> &BeanTypeKey {
        &self.delegate_type
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn decorator(&self) -> &Arc<dyn Decorator> {
        &self.decorator
    }

    /// 装饰器是否适用于给定类型闭包的 Bean
    pub fn applies_to(&self, type_closure: &HashSet<BeanTypeKey>) -> bool {
        type_closure.contains(&self.delegate_type)
    }

    /// 装饰器是否覆盖某个方法
    pub fn decorates_method(&self, method: &str) -> bool {
        self.decorator.decorated_methods().iter().any(|m| *m == method)
    }
}

impl std::fmt::Debug for DecoratorDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratorDefinition")
            .field("name", &self.name)
            .field("delegate_type", &self.delegate_type)
            .field("decorated_types", &self.decorated_types)
            .field("priority", &self.priority)
            .finish()
    }
}

/// 拦截器注册器
///
/// 用于 inventory 自动收集拦截器定义
pub struct InterceptorRegistration {
    /// 拦截器名称
    pub name: &'static str,

    /// 创建定义的函数
    pub creator: fn() -> ContainerResult<InterceptorDefinition>,
}

impl InterceptorRegistration {
    pub const fn new(
        name: &'static str,
        creator: fn() -> ContainerResult<InterceptorDefinition>,
    ) -> Self {
        Self { name, creator }
    }

    pub fn create_definition(&self) -> ContainerResult<InterceptorDefinition> {
        (self.creator)()
    }
}

// 使用 inventory 收集所有拦截器注册器
inventory::collect!(InterceptorRegistration);

/// 获取所有注册的拦截器注册器
pub fn get_all_interceptor_registrations() -> impl Iterator<Item = &'static InterceptorRegistration>
{
    inventory::iter::<InterceptorRegistration>()
}

/// 装饰器注册器
///
/// 用于 inventory 自动收集装饰器定义
pub struct DecoratorRegistration {
    /// 装饰器名称
    pub name: &'static str,

    /// 创建定义的函数
    pub creator: fn() -> ContainerResult<DecoratorDefinition>,
}

impl DecoratorRegistration {
    pub const fn new(
        name: &'static str,
        creator: fn() -> ContainerResult<DecoratorDefinition>,
    ) -> Self {
        Self { name, creator }
    }

    pub fn create_definition(&self) -> ContainerResult<DecoratorDefinition> {
        (self.creator)()
    }
}

// 使用 inventory 收集所有装饰器注册器
inventory::collect!(DecoratorRegistration);

/// 获取所有注册的装饰器注册器
pub fn get_all_decorator_registrations() -> impl Iterator<Item = &'static DecoratorRegistration> {
    inventory::iter::<DecoratorRegistration>()
}

/// 拦截器/装饰器注册表
///
/// 启用顺序即链序：优先级升序，同优先级按注册先后。拦截器靠前者
/// 在链上更外层，装饰器靠前者最先执行。配置中的名称列表可在之后
/// 整体重排。
pub struct InterceptorRegistry {
    interceptors: Vec<Arc<InterceptorDefinition>>,
    decorators: Vec<Arc<DecoratorDefinition>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
            decorators: Vec::new(),
        }
    }

    /// 启用一个拦截器（重复名称报定义错误）
    ///
    /// 优先级升序排列，同优先级保持注册先后（稳定排序）。
    pub fn enable_interceptor(&mut self, definition: InterceptorDefinition) -> ContainerResult<()> {
        if self.interceptors.iter().any(|d| d.name() == definition.name()) {
            return Err(ContainerError::Definition(format!(
                "interceptor '{}' is enabled twice",
                definition.name()
            )));
        }
        tracing::debug!(
            "Enabling interceptor '{}' (priority {})",
            definition.name(),
            definition.priority()
        );
        self.interceptors.push(Arc::new(definition));
        self.interceptors.sort_by_key(|d| d.priority());
        Ok(())
    }

    /// 启用一个装饰器（重复名称报定义错误）
    ///
    /// 优先级升序排列，同优先级保持注册先后（稳定排序）。
    pub fn enable_decorator(&mut self, definition: DecoratorDefinition) -> ContainerResult<()> {
        if self.decorators.iter().any(|d| d.name() == definition.name()) {
            return Err(ContainerError::Definition(format!(
                "decorator '{}' is enabled twice",
                definition.name()
            )));
        }
        tracing::debug!(
            "Enabling decorator '{}' (priority {})",
            definition.name(),
            definition.priority()
        );
        self.decorators.push(Arc::new(definition));
        self.decorators.sort_by_key(|d| d.priority());
        Ok(())
    }

    /// 按配置中的名称列表重排启用顺序
    ///
    /// 列表中的名字必须都已注册；未出现在列表中的保持原有（优先级）
    /// 相对顺序，排在列表命中的之后。
    pub fn apply_enablement_order(
        &mut self,
        interceptor_order: &[String],
        decorator_order: &[String],
    ) -> ContainerResult<()> {
        for name in interceptor_order {
            if !self.interceptors.iter().any(|d| d.name() == name) {
                return Err(ContainerError::Definition(format!(
                    "enabled_interceptors names unknown interceptor '{}'",
                    name
                )));
            }
        }
        for name in decorator_order {
            if !self.decorators.iter().any(|d| d.name() == name) {
                return Err(ContainerError::Definition(format!(
                    "enabled_decorators names unknown decorator '{}'",
                    name
                )));
            }
        }

        let rank = |name: &str, order: &[String]| {
            order
                .iter()
                .position(|n| n == name)
                .unwrap_or(order.len())
        };
        self.interceptors
            .sort_by_key(|d| rank(d.name(), interceptor_order));
        self.decorators
            .sort_by_key(|d| rank(d.name(), decorator_order));
        Ok(())
    }

    /// 从 inventory 自动加载所有注册的拦截器
    pub fn auto_load_interceptors(&mut self) -> ContainerResult<()> {
        let registrations: Vec<_> = get_all_interceptor_registrations().collect();
        tracing::info!(
            "Auto-loading {} interceptor(s) from registry",
            registrations.len()
        );

        for registration in registrations {
            tracing::debug!("  ├─ Loading interceptor: {}", registration.name);
            self.enable_interceptor(registration.create_definition()?)?;
        }
        Ok(())
    }

    /// 从 inventory 自动加载所有注册的装饰器
    pub fn auto_load_decorators(&mut self) -> ContainerResult<()> {
        let registrations: Vec<_> = get_all_decorator_registrations().collect();
        tracing::info!(
            "Auto-loading {} decorator(s) from registry",
            registrations.len()
        );

        for registration in registrations {
            tracing::debug!("  ├─ Loading decorator: {}", registration.name);
            self.enable_decorator(registration.create_definition()?)?;
        }
        Ok(())
    }

    pub fn interceptors(&self) -> &[Arc<InterceptorDefinition>] {
        &self.interceptors
    }

    pub fn decorators(&self) -> &[Arc<DecoratorDefinition>] {
        &self.decorators
    }

    pub fn len(&self) -> usize {
        self.interceptors.len() + self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty() && self.decorators.is_empty()
    }
}

impl Default for InterceptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::annotation::{AnnotationInstance, AnnotationType};
    use trellis_core::interception::{Delegate, InvocationResult, MethodArgs};

    struct Noop;
    impl Interceptor for Noop {
        fn name(&self) -> &str {
            "Noop"
        }
    }

    struct Discounter;
    impl Decorator for Discounter {
        fn name(&self) -> &str {
            "Discounter"
        }
        fn decorated_methods(&self) -> Vec<&'static str> {
            vec!["charge"]
        }
        fn invoke(
            &self,
            method: &str,
            delegate: &mut Delegate<'_>,
            args: MethodArgs,
        ) -> InvocationResult {
            let _ = method;
            delegate.proceed(args)
        }
    }

    struct Silent;
    impl Decorator for Silent {
        fn name(&self) -> &str {
            "Silent"
        }
        fn decorated_methods(&self) -> Vec<&'static str> {
            vec![]
        }
        fn invoke(
            &self,
            _method: &str,
            delegate: &mut Delegate<'_>,
            args: MethodArgs,
        ) -> InvocationResult {
            delegate.proceed(args)
        }
    }

    fn tx_bindings() -> BindingSet {
        let tx = AnnotationType::new("Transactional");
        BindingSet::from_iter([AnnotationInstance::of(&tx)])
    }

    inventory::submit! {
        InterceptorRegistration::new("AutoTx", || {
            let tx = AnnotationType::new("Transactional");
            InterceptorDefinition::new(
                "AutoTx",
                BindingSet::from_iter([AnnotationInstance::of(&tx)]),
                Arc::new(Noop),
            )
        })
    }

    inventory::submit! {
        DecoratorRegistration::new("AutoDiscounter", || {
            DecoratorDefinition::new(
                "AutoDiscounter",
                BeanTypeKey::interface("Account"),
                vec![BeanTypeKey::interface("Account")],
                Arc::new(Discounter),
            )
        })
    }

    #[test]
    fn test_interceptor_without_bindings_is_definition_error() {
        let result = InterceptorDefinition::new("Empty", BindingSet::new(), Arc::new(Noop));
        assert!(matches!(result, Err(ContainerError::Definition(_))));
    }

    #[test]
    fn test_decorator_delegate_must_be_interface() {
        let result = DecoratorDefinition::new(
            "Discounter",
            BeanTypeKey::class("Account"),
            vec![BeanTypeKey::class("Account")],
            Arc::new(Discounter),
        );
        assert!(matches!(result, Err(ContainerError::Definition(_))));
    }

    #[test]
    fn test_decorator_delegate_must_be_decorated() {
        let result = DecoratorDefinition::new(
            "Discounter",
            BeanTypeKey::interface("Account"),
            vec![BeanTypeKey::interface("Ledger")],
            Arc::new(Discounter),
        );
        assert!(matches!(result, Err(ContainerError::Definition(_))));
    }

    #[test]
    fn test_decorator_overriding_nothing_is_accepted() {
        // 只覆盖部分接口的抽象装饰器可以一个方法都不覆盖，
        // 注册合法，链上对所有方法透明
        let definition = DecoratorDefinition::new(
            "Silent",
            BeanTypeKey::interface("Account"),
            vec![BeanTypeKey::interface("Account")],
            Arc::new(Silent),
        )
        .unwrap();
        assert!(!definition.decorates_method("charge"));
        assert!(!definition.decorates_method("statement"));

        let mut registry = InterceptorRegistry::new();
        registry.enable_decorator(definition).unwrap();
        assert_eq!(registry.decorators().len(), 1);
    }

    #[test]
    fn test_priority_orders_ascending_with_registration_ties() {
        let mut registry = InterceptorRegistry::new();
        registry
            .enable_interceptor(
                InterceptorDefinition::new("C", tx_bindings(), Arc::new(Noop))
                    .unwrap()
                    .with_priority(10),
            )
            .unwrap();
        registry
            .enable_interceptor(
                InterceptorDefinition::new("A", tx_bindings(), Arc::new(Noop))
                    .unwrap()
                    .with_priority(5),
            )
            .unwrap();
        registry
            .enable_interceptor(
                InterceptorDefinition::new("B", tx_bindings(), Arc::new(Noop))
                    .unwrap()
                    .with_priority(5),
            )
            .unwrap();
        // 升序，同优先级按注册先后
        let names: Vec<_> = registry.interceptors().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_auto_load_picks_up_submitted_registrations() {
        let mut registry = InterceptorRegistry::new();
        registry.auto_load_interceptors().unwrap();
        registry.auto_load_decorators().unwrap();
        assert!(registry.interceptors().iter().any(|d| d.name() == "AutoTx"));
        assert!(registry
            .decorators()
            .iter()
            .any(|d| d.name() == "AutoDiscounter"));
    }

    #[test]
    fn test_duplicate_enablement_is_rejected() {
        let mut registry = InterceptorRegistry::new();
        registry
            .enable_interceptor(
                InterceptorDefinition::new("Tx", tx_bindings(), Arc::new(Noop)).unwrap(),
            )
            .unwrap();
        let result = registry.enable_interceptor(
            InterceptorDefinition::new("Tx", tx_bindings(), Arc::new(Noop)).unwrap(),
        );
        assert!(matches!(result, Err(ContainerError::Definition(_))));
    }

    #[test]
    fn test_enablement_order_is_applied() {
        let mut registry = InterceptorRegistry::new();
        for name in ["A", "B", "C"] {
            registry
                .enable_interceptor(
                    InterceptorDefinition::new(name, tx_bindings(), Arc::new(Noop)).unwrap(),
                )
                .unwrap();
        }
        registry
            .apply_enablement_order(&["C".to_string(), "A".to_string()], &[])
            .unwrap();
        let names: Vec<_> = registry.interceptors().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_unknown_name_in_order_is_rejected() {
        let mut registry = InterceptorRegistry::new();
        let result = registry.apply_enablement_order(&["Ghost".to_string()], &[]);
        assert!(matches!(result, Err(ContainerError::Definition(_))));
    }
}
