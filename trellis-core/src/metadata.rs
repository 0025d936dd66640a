//! Bean 元数据模型
//!
//! `AnnotatedType` 是一个 Bean 类型的只读元数据视图：作用域、限定符、
//! 构造型、类型闭包、类级与方法级拦截器绑定、业务方法表以及 EJB 风格
//! 的自拦截方法。视图在构建时一次性计算（构造型绑定的传递收集、有效
//! 作用域解析、方法集签名），之后不再变化。
//!
//! 扫描/发现属于外部协作方：由它们（或测试）通过 `AnnotatedTypeBuilder`
//! 声明元数据，容器本身不做类路径检查。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::annotation::{
    default_qualifier, AnnotationInstance, BindingSet, Stereotype,
};
use crate::interception::{AroundInvokeFn, LifecycleFn, MethodBody};
use crate::scope::ScopeKind;

/// Bean 可赋值类型的标识
///
/// 装饰器的委托类型必须是接口种类；解析时按类型闭包包含关系匹配。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeanTypeKey {
    name: String,
    kind: TypeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
}

impl BeanTypeKey {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Class,
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Interface,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }
}

impl fmt::Display for BeanTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 方法种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// 普通业务方法，可被拦截
    Business,
    /// 编译器合成方法（桥接等价物），必须排除在拦截集之外，
    /// 否则会造成双重调用
    Synthetic,
    /// 序列化钩子，目标类已自行声明，生成器不得重复生成
    SerializationHook,
}

/// 业务方法描述
pub struct BusinessMethod {
    name: String,
    kind: MethodKind,
    bindings: BindingSet,
    body: MethodBody,
}

impl BusinessMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// 方法级绑定（只增不减，与类级绑定合并后参与匹配）
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn body(&self) -> &MethodBody {
        &self.body
    }
}

impl fmt::Debug for BusinessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusinessMethod")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Bean 自身类上声明的拦截方法（EJB 风格自拦截）
#[derive(Default)]
pub struct SelfInterception {
    pub around_invoke: Vec<AroundInvokeFn>,
    pub post_construct: Vec<LifecycleFn>,
    pub pre_destroy: Vec<LifecycleFn>,
}

impl SelfInterception {
    pub fn is_empty(&self) -> bool {
        self.around_invoke.is_empty()
            && self.post_construct.is_empty()
            && self.pre_destroy.is_empty()
    }
}

/// 一个 Bean 类型的不可变元数据视图
pub struct AnnotatedType {
    name: String,
    resolved_scope: ScopeKind,
    qualifiers: Vec<AnnotationInstance>,
    type_closure: HashSet<BeanTypeKey>,
    effective_class_bindings: BindingSet,
    methods: Vec<BusinessMethod>,
    method_index: HashMap<String, usize>,
    self_interception: SelfInterception,
    method_set_signature: String,
}

impl AnnotatedType {
    pub fn builder(name: impl Into<String>) -> AnnotatedTypeBuilder {
        AnnotatedTypeBuilder::new(name)
    }

    /// Bean 类型名（同时作为代理缓存键的一部分）
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 有效作用域：显式声明优先，其次构造型默认，最后 Dependent
    pub fn scope(&self) -> ScopeKind {
        self.resolved_scope
    }

    /// 限定符集合；未声明任何限定符时隐式携带 `@Default`
    pub fn qualifiers(&self) -> &[AnnotationInstance] {
        &self.qualifiers
    }

    /// 类型闭包：本类型可赋值到的所有类型
    pub fn type_closure(&self) -> &HashSet<BeanTypeKey> {
        &self.type_closure
    }

    pub fn is_assignable_to(&self, key: &BeanTypeKey) -> bool {
        self.type_closure.contains(key)
    }

    /// 有效类级绑定：类上直接声明的绑定与构造型传递携带的绑定之并
    pub fn effective_class_bindings(&self) -> &BindingSet {
        &self.effective_class_bindings
    }

    pub fn methods(&self) -> &[BusinessMethod] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&BusinessMethod> {
        self.method_index.get(name).map(|&i| &self.methods[i])
    }

    pub fn self_interception(&self) -> &SelfInterception {
        &self.self_interception
    }

    /// 方法集签名：业务方法名排序后拼接。解析结果与代理类都以
    /// （类型名, 方法集签名）为缓存键。
    pub fn method_set_signature(&self) -> &str {
        &self.method_set_signature
    }

    /// 某方法参与匹配的绑定集：类级有效绑定 ∪ 方法级绑定
    pub fn merged_bindings_for(&self, method: &BusinessMethod) -> BindingSet {
        let mut merged = self.effective_class_bindings.clone();
        merged.merge(method.bindings());
        merged
    }
}

impl fmt::Debug for AnnotatedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatedType")
            .field("name", &self.name)
            .field("scope", &self.resolved_scope)
            .field("qualifiers", &self.qualifiers)
            .field("class_bindings", &self.effective_class_bindings)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// AnnotatedType 构建器
pub struct AnnotatedTypeBuilder {
    name: String,
    declared_scope: Option<ScopeKind>,
    qualifiers: Vec<AnnotationInstance>,
    stereotypes: Vec<Arc<Stereotype>>,
    class_bindings: BindingSet,
    type_closure: HashSet<BeanTypeKey>,
    methods: Vec<BusinessMethod>,
    self_interception: SelfInterception,
}

impl AnnotatedTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut type_closure = HashSet::new();
        // 类型闭包始终包含 Bean 自身的类
        type_closure.insert(BeanTypeKey::class(name.clone()));
        Self {
            name,
            declared_scope: None,
            qualifiers: Vec::new(),
            stereotypes: Vec::new(),
            class_bindings: BindingSet::new(),
            type_closure,
            methods: Vec::new(),
            self_interception: SelfInterception::default(),
        }
    }

    pub fn scope(mut self, scope: ScopeKind) -> Self {
        self.declared_scope = Some(scope);
        self
    }

    pub fn qualifier(mut self, qualifier: AnnotationInstance) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn stereotype(mut self, stereotype: &Arc<Stereotype>) -> Self {
        self.stereotypes.push(Arc::clone(stereotype));
        self
    }

    /// 类级拦截器绑定
    pub fn class_binding(mut self, binding: AnnotationInstance) -> Self {
        self.class_bindings.insert(binding);
        self
    }

    /// 声明本类型可赋值到的类型（接口或父类）
    pub fn bean_type(mut self, key: BeanTypeKey) -> Self {
        self.type_closure.insert(key);
        self
    }

    /// 业务方法
    pub fn business_method(
        mut self,
        name: impl Into<String>,
        bindings: BindingSet,
        body: MethodBody,
    ) -> Self {
        self.methods.push(BusinessMethod {
            name: name.into(),
            kind: MethodKind::Business,
            bindings,
            body,
        });
        self
    }

    /// 合成方法（桥接等价物）：可调用，永不进入拦截集
    pub fn synthetic_method(mut self, name: impl Into<String>, body: MethodBody) -> Self {
        self.methods.push(BusinessMethod {
            name: name.into(),
            kind: MethodKind::Synthetic,
            bindings: BindingSet::new(),
            body,
        });
        self
    }

    /// 目标类自行声明的序列化钩子：生成器检测到后跳过，不重复生成
    pub fn serialization_hook(mut self, name: impl Into<String>, body: MethodBody) -> Self {
        self.methods.push(BusinessMethod {
            name: name.into(),
            kind: MethodKind::SerializationHook,
            bindings: BindingSet::new(),
            body,
        });
        self
    }

    /// EJB 风格的自拦截 around-invoke 方法
    pub fn self_around_invoke(mut self, f: AroundInvokeFn) -> Self {
        self.self_interception.around_invoke.push(f);
        self
    }

    pub fn self_post_construct(mut self, f: LifecycleFn) -> Self {
        self.self_interception.post_construct.push(f);
        self
    }

    pub fn self_pre_destroy(mut self, f: LifecycleFn) -> Self {
        self.self_interception.pre_destroy.push(f);
        self
    }

    pub fn build(self) -> Arc<AnnotatedType> {
        // 构造型贡献：传递收集绑定，未显式声明作用域时取第一个默认作用域
        let mut effective_bindings = self.class_bindings.clone();
        let mut seen = HashSet::new();
        for stereotype in &self.stereotypes {
            stereotype.collect_interceptor_bindings(&mut effective_bindings, &mut seen);
        }

        let resolved_scope = self.declared_scope.unwrap_or_else(|| {
            let mut seen = HashSet::new();
            self.stereotypes
                .iter()
                .find_map(|s| s.resolve_default_scope(&mut seen))
                .unwrap_or_default()
        });

        let mut qualifiers = self.qualifiers;
        for stereotype in &self.stereotypes {
            qualifiers.extend(stereotype.qualifiers().iter().cloned());
        }
        if qualifiers.is_empty() {
            qualifiers.push(default_qualifier());
        }

        let mut method_names: Vec<&str> = self
            .methods
            .iter()
            .filter(|m| m.kind == MethodKind::Business)
            .map(|m| m.name.as_str())
            .collect();
        method_names.sort_unstable();
        let method_set_signature = method_names.join(";");

        let method_index = self
            .methods
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();

        tracing::trace!(
            "Built annotated type '{}' with {} method(s), scope {:?}",
            self.name,
            self.methods.len(),
            resolved_scope
        );

        Arc::new(AnnotatedType {
            name: self.name,
            resolved_scope,
            qualifiers,
            type_closure: self.type_closure,
            effective_class_bindings: effective_bindings,
            methods: self.methods,
            method_index,
            self_interception: self.self_interception,
            method_set_signature,
        })
    }
}
