//! Bean 管理器
//!
//! 容器的注册与解析核心：启动期登记 `BeanDefinition`，冻结后提供
//! 按类型 + 限定符的确定性解析。创建路径上的循环依赖通过创建中
//! 集合（RAII 守卫）检测并报错，而不是栈溢出。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::annotation::AnnotationInstance;
use crate::bean::{BeanDefinition, BeanInstance};
use crate::config::ContainerConfig;
use crate::context::ContextsService;
use crate::creational::CreationalContext;
use crate::error::{ContainerError, ContainerResult};
use crate::metadata::BeanTypeKey;
use crate::utils::dependency::{CreationGuard, CreationTracker};

/// Bean 管理器
pub struct BeanManager {
    config: ContainerConfig,
    definitions: RwLock<HashMap<String, Arc<BeanDefinition>>>,
    type_index: RwLock<HashMap<BeanTypeKey, Vec<Arc<BeanDefinition>>>>,
    contexts: Arc<ContextsService>,
    creation_tracker: CreationTracker,
    frozen: AtomicBool,
}

impl BeanManager {
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            definitions: RwLock::new(HashMap::new()),
            type_index: RwLock::new(HashMap::new()),
            contexts: Arc::new(ContextsService::new()),
            creation_tracker: CreationTracker::new(),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn builder() -> BeanManagerBuilder {
        BeanManagerBuilder::new()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn contexts(&self) -> &Arc<ContextsService> {
        &self.contexts
    }

    /// 注册一个 Bean 定义
    ///
    /// 仅允许在容器冻结前调用；名称冲突报 `BeanAlreadyExists`。
    pub fn register(&self, definition: BeanDefinition) -> ContainerResult<Arc<BeanDefinition>> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(ContainerError::ConfigurationFrozen);
        }

        let definition = Arc::new(definition);
        {
            let mut definitions = self.definitions.write();
            if definitions.contains_key(definition.name()) {
                return Err(ContainerError::BeanAlreadyExists(
                    definition.name().to_string(),
                ));
            }
            definitions.insert(definition.name().to_string(), Arc::clone(&definition));
        }

        let mut index = self.type_index.write();
        for key in definition.annotated_type().type_closure() {
            index
                .entry(key.clone())
                .or_default()
                .push(Arc::clone(&definition));
        }

        tracing::debug!(
            "Registered bean '{}' of type '{}' ({:?} scope)",
            definition.name(),
            definition.annotated_type().name(),
            definition.scope()
        );
        Ok(definition)
    }

    /// 冻结定义集并激活应用/单例上下文
    pub fn initialize(&self) {
        self.frozen.store(true, Ordering::Release);
        self.contexts.init();
        tracing::info!(
            "Container '{}' initialized with {} bean(s)",
            self.config.application_name,
            self.definitions.read().len()
        );
    }

    /// 销毁全部上下文
    pub fn shutdown(&self) {
        self.contexts.destroy();
        tracing::info!("Container '{}' shut down", self.config.application_name);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// 按名称取定义
    pub fn definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))
    }

    /// 全部已注册定义（按名称排序，解析结果与注册顺序无关）
    pub fn definitions(&self) -> Vec<Arc<BeanDefinition>> {
        let mut all: Vec<_> = self.definitions.read().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// 按类型 + 限定符解析候选集
    pub fn resolve_all(
        &self,
        bean_type: &BeanTypeKey,
        qualifiers: &[AnnotationInstance],
    ) -> Vec<Arc<BeanDefinition>> {
        let index = self.type_index.read();
        let mut candidates: Vec<Arc<BeanDefinition>> = index
            .get(bean_type)
            .map(|defs| {
                defs.iter()
                    .filter(|d| d.satisfies_qualifiers(qualifiers))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        candidates.sort_by(|a, b| a.name().cmp(b.name()));
        candidates
    }

    /// 按类型 + 限定符解析唯一 Bean
    ///
    /// 零候选报 `UnsatisfiedResolution`，多候选报 `AmbiguousResolution`，
    /// 错误里带上类型与候选名便于排查。
    pub fn resolve(
        &self,
        bean_type: &BeanTypeKey,
        qualifiers: &[AnnotationInstance],
    ) -> ContainerResult<Arc<BeanDefinition>> {
        let mut candidates = self.resolve_all(bean_type, qualifiers);
        match candidates.len() {
            0 => Err(ContainerError::UnsatisfiedResolution {
                bean_type: bean_type.name().to_string(),
                qualifiers: qualifiers
                    .iter()
                    .map(|q| format!("@{}", q.type_name()))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ContainerError::AmbiguousResolution {
                bean_type: bean_type.name().to_string(),
                candidates: candidates
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// 在循环检测守卫内创建一个实例
    ///
    /// 同一线程（或并发创建图）内重入同名 Bean 即报循环依赖，带出
    /// 当前创建中的 Bean 集合。
    pub fn create_guarded(
        &self,
        definition: &BeanDefinition,
        creational: &mut CreationalContext,
    ) -> ContainerResult<BeanInstance> {
        let guard = CreationGuard::enter(&self.creation_tracker, definition.name()).ok_or_else(
            || {
                let mut chain = self.creation_tracker.current_creating();
                chain.sort();
                ContainerError::CircularDependency(format!(
                    "'{}' (creating: {})",
                    definition.name(),
                    chain.join(", ")
                ))
            },
        )?;
        let instance = definition.create_instance(creational);
        drop(guard);
        instance
    }
}

impl std::fmt::Debug for BeanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanManager")
            .field("application", &self.config.application_name)
            .field("beans", &self.definitions.read().len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Bean 管理器构建器
pub struct BeanManagerBuilder {
    config: ContainerConfig,
    definitions: Vec<BeanDefinition>,
}

impl BeanManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            definitions: Vec::new(),
        }
    }

    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register(mut self, definition: BeanDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// 构建并初始化管理器
    pub fn build(self) -> ContainerResult<Arc<BeanManager>> {
        let manager = BeanManager::new(self.config);
        for definition in self.definitions {
            manager.register(definition)?;
        }
        manager.initialize();
        Ok(Arc::new(manager))
    }
}

impl Default for BeanManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
