//! 注解元数据模型
//!
//! Rust 没有运行时注解，限定符（qualifier）和拦截器绑定（interceptor
//! binding）以显式数据建模：`AnnotationType` 描述注解类型及其非绑定成员
//! 掩码，`AnnotationInstance` 携带成员取值。绑定相等性比较时排除被标记
//! 为非绑定的成员——两个非绑定成员取值不同的实例仍视为相等的绑定。

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::scope::ScopeKind;

/// 注解成员取值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<MemberValue>),
}

impl From<&str> for MemberValue {
    fn from(s: &str) -> Self {
        MemberValue::Str(s.to_string())
    }
}

impl From<String> for MemberValue {
    fn from(s: String) -> Self {
        MemberValue::Str(s)
    }
}

impl From<i64> for MemberValue {
    fn from(i: i64) -> Self {
        MemberValue::Int(i)
    }
}

impl From<bool> for MemberValue {
    fn from(b: bool) -> Self {
        MemberValue::Bool(b)
    }
}

/// 注解类型
///
/// `non_binding` 列出不参与绑定相等性比较的成员名。
#[derive(Debug)]
pub struct AnnotationType {
    name: String,
    non_binding: BTreeSet<String>,
}

impl AnnotationType {
    /// 声明一个注解类型，所有成员均参与绑定比较
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            non_binding: BTreeSet::new(),
        })
    }

    /// 声明一个注解类型并标记非绑定成员
    pub fn with_non_binding<I, S>(name: impl Into<String>, members: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            name: name.into(),
            non_binding: members.into_iter().map(Into::into).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_non_binding(&self, member: &str) -> bool {
        self.non_binding.contains(member)
    }
}

/// 注解实例 - 类型加成员取值
#[derive(Clone)]
pub struct AnnotationInstance {
    ty: Arc<AnnotationType>,
    members: BTreeMap<String, MemberValue>,
}

impl AnnotationInstance {
    /// 不带成员的实例（标记注解）
    pub fn of(ty: &Arc<AnnotationType>) -> Self {
        Self {
            ty: Arc::clone(ty),
            members: BTreeMap::new(),
        }
    }

    /// 设置成员取值
    pub fn with_member(mut self, name: impl Into<String>, value: impl Into<MemberValue>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    pub fn annotation_type(&self) -> &Arc<AnnotationType> {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    pub fn member(&self, name: &str) -> Option<&MemberValue> {
        self.members.get(name)
    }

    /// 绑定相等性：类型名相同，且所有绑定成员取值一致。
    /// 非绑定成员被排除在比较之外。
    pub fn binding_eq(&self, other: &AnnotationInstance) -> bool {
        if self.ty.name() != other.ty.name() {
            return false;
        }
        let keys: BTreeSet<&String> = self.members.keys().chain(other.members.keys()).collect();
        for key in keys {
            if self.ty.is_non_binding(key) || other.ty.is_non_binding(key) {
                continue;
            }
            if self.members.get(key) != other.members.get(key) {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for AnnotationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.ty.name())?;
        if !self.members.is_empty() {
            let members: Vec<String> = self
                .members
                .iter()
                .map(|(k, v)| format!("{}={:?}", k, v))
                .collect();
            write!(f, "({})", members.join(", "))?;
        }
        Ok(())
    }
}

/// 绑定集合
///
/// 同一注解类型在集合中至多出现一次，后插入的同类型绑定覆盖先前的。
#[derive(Clone, Default)]
pub struct BindingSet {
    bindings: Vec<AnnotationInstance>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_iter<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = AnnotationInstance>,
    {
        let mut set = Self::new();
        for binding in bindings {
            set.insert(binding);
        }
        set
    }

    /// 插入绑定，同类型覆盖
    pub fn insert(&mut self, binding: AnnotationInstance) {
        self.bindings
            .retain(|existing| existing.type_name() != binding.type_name());
        self.bindings.push(binding);
    }

    /// 合并另一个集合（对方的同类型绑定覆盖本方）
    pub fn merge(&mut self, other: &BindingSet) {
        for binding in &other.bindings {
            self.insert(binding.clone());
        }
    }

    /// 以绑定相等性查找
    pub fn contains(&self, binding: &AnnotationInstance) -> bool {
        self.bindings.iter().any(|b| b.binding_eq(binding))
    }

    /// 子集判定：本集合的每个绑定都能在 `other` 中找到绑定相等的成员
    pub fn is_subset_of(&self, other: &BindingSet) -> bool {
        self.bindings.iter().all(|b| other.contains(b))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationInstance> {
        self.bindings.iter()
    }
}

impl fmt::Debug for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bindings.iter()).finish()
    }
}

/// 构造型（stereotype）
///
/// 一组可复用的元数据：默认作用域、限定符与拦截器绑定。构造型可以由
/// 其他构造型组合而成，绑定收集是传递的。
pub struct Stereotype {
    name: String,
    default_scope: Option<ScopeKind>,
    qualifiers: Vec<AnnotationInstance>,
    interceptor_bindings: Vec<AnnotationInstance>,
    parents: Vec<Arc<Stereotype>>,
}

impl Stereotype {
    pub fn builder(name: impl Into<String>) -> StereotypeBuilder {
        StereotypeBuilder {
            name: name.into(),
            default_scope: None,
            qualifiers: Vec::new(),
            interceptor_bindings: Vec::new(),
            parents: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_scope(&self) -> Option<ScopeKind> {
        self.default_scope
    }

    pub fn qualifiers(&self) -> &[AnnotationInstance] {
        &self.qualifiers
    }

    /// 传递收集本构造型及其父构造型携带的拦截器绑定
    ///
    /// `seen` 防止组合环导致的无限递归。
    pub fn collect_interceptor_bindings(&self, out: &mut BindingSet, seen: &mut HashSet<String>) {
        if !seen.insert(self.name.clone()) {
            return;
        }
        for binding in &self.interceptor_bindings {
            out.insert(binding.clone());
        }
        for parent in &self.parents {
            parent.collect_interceptor_bindings(out, seen);
        }
    }

    /// 沿组合链查找第一个声明的默认作用域
    pub fn resolve_default_scope(&self, seen: &mut HashSet<String>) -> Option<ScopeKind> {
        if !seen.insert(self.name.clone()) {
            return None;
        }
        if let Some(scope) = self.default_scope {
            return Some(scope);
        }
        self.parents
            .iter()
            .find_map(|parent| parent.resolve_default_scope(seen))
    }
}

pub struct StereotypeBuilder {
    name: String,
    default_scope: Option<ScopeKind>,
    qualifiers: Vec<AnnotationInstance>,
    interceptor_bindings: Vec<AnnotationInstance>,
    parents: Vec<Arc<Stereotype>>,
}

impl StereotypeBuilder {
    pub fn default_scope(mut self, scope: ScopeKind) -> Self {
        self.default_scope = Some(scope);
        self
    }

    pub fn qualifier(mut self, qualifier: AnnotationInstance) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn interceptor_binding(mut self, binding: AnnotationInstance) -> Self {
        self.interceptor_bindings.push(binding);
        self
    }

    /// 组合另一个构造型
    pub fn inherits(mut self, parent: &Arc<Stereotype>) -> Self {
        self.parents.push(Arc::clone(parent));
        self
    }

    pub fn build(self) -> Arc<Stereotype> {
        Arc::new(Stereotype {
            name: self.name,
            default_scope: self.default_scope,
            qualifiers: self.qualifiers,
            interceptor_bindings: self.interceptor_bindings,
            parents: self.parents,
        })
    }
}

/// 内建的 `@Default` 限定符，未声明任何限定符的 Bean 隐式携带
pub fn default_qualifier() -> AnnotationInstance {
    use once_cell::sync::Lazy;
    static DEFAULT: Lazy<Arc<AnnotationType>> = Lazy::new(|| AnnotationType::new("Default"));
    AnnotationInstance::of(&DEFAULT)
}
