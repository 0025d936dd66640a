//! Bean 定义
//!
//! `BeanDefinition` 描述一个可被容器管理的 contextual 类型：名称、元数据
//! 视图、创建闭包与可选的销毁回调。定义在启动期注册后不再变化。

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::annotation::AnnotationInstance;
use crate::creational::CreationalContext;
use crate::error::{ContainerError, ContainerResult};
use crate::metadata::{AnnotatedType, BeanTypeKey};
use crate::scope::ScopeKind;

/// Bean 实例的统一表示
pub type BeanInstance = Arc<dyn Any + Send + Sync>;

/// 创建闭包：在给定的创建上下文内产出一个实例
pub type CreateFn =
    Arc<dyn Fn(&mut CreationalContext) -> ContainerResult<BeanInstance> + Send + Sync>;

/// 销毁回调
pub type DestroyFn = Arc<dyn Fn(&BeanInstance) + Send + Sync>;

/// Bean 的定义期标识（客户端代理缓存的键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeanId(u64);

impl BeanId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        BeanId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bean#{}", self.0)
    }
}

/// Bean 定义
pub struct BeanDefinition {
    id: BeanId,
    name: String,
    annotated_type: Arc<AnnotatedType>,
    create: CreateFn,
    destroy: Option<DestroyFn>,
}

impl BeanDefinition {
    /// 以显式名称创建定义
    pub fn new(
        name: impl Into<String>,
        annotated_type: Arc<AnnotatedType>,
        create: CreateFn,
    ) -> Self {
        Self {
            id: BeanId::next(),
            name: name.into(),
            annotated_type,
            create,
            destroy: None,
        }
    }

    /// 以类型名派生默认 Bean 名称（`UserService` -> `userService`）
    pub fn of_type(annotated_type: Arc<AnnotatedType>, create: CreateFn) -> Self {
        let name = crate::utils::naming::to_camel_case(annotated_type.name());
        Self::new(name, annotated_type, create)
    }

    pub fn with_destroy(mut self, destroy: DestroyFn) -> Self {
        self.destroy = Some(destroy);
        self
    }

    pub fn id(&self) -> BeanId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotated_type(&self) -> &Arc<AnnotatedType> {
        &self.annotated_type
    }

    pub fn scope(&self) -> ScopeKind {
        self.annotated_type.scope()
    }

    pub fn qualifiers(&self) -> &[AnnotationInstance] {
        self.annotated_type.qualifiers()
    }

    pub fn is_assignable_to(&self, key: &BeanTypeKey) -> bool {
        self.annotated_type.is_assignable_to(key)
    }

    /// 请求的限定符是否全部被本 Bean 满足
    pub fn satisfies_qualifiers(&self, requested: &[AnnotationInstance]) -> bool {
        requested.iter().all(|req| {
            self.qualifiers()
                .iter()
                .any(|declared| declared.binding_eq(req))
        })
    }

    /// 在给定创建上下文内产出一个新实例
    pub fn create_instance(
        &self,
        creational: &mut CreationalContext,
    ) -> ContainerResult<BeanInstance> {
        (self.create)(creational).map_err(|e| match e {
            ContainerError::CircularDependency(_) => e,
            other => ContainerError::BeanCreationFailed(format!("{}: {}", self.name, other)),
        })
    }

    pub fn destroy_callback(&self) -> Option<&DestroyFn> {
        self.destroy.as_ref()
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("scope", &self.scope())
            .field("type", &self.annotated_type.name())
            .finish()
    }
}
