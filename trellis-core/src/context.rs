//! 作用域上下文
//!
//! 每个作用域实例是一个状态机：uninitialized → active → inactive →
//! destroyed。`DefaultContext` 提供按需创建、活跃期内实例身份稳定、
//! 作用域结束时按创建逆序销毁的存储；`ContextsService` 按作用域种类
//! 管理当前上下文（请求作用域以线程为键，会话作用域以显式会话 id
//! 为键，应用/单例为进程级）。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};

use crate::bean::{BeanDefinition, BeanId, BeanInstance, DestroyFn};
use crate::creational::CreationalContext;
use crate::error::{ContainerError, ContainerResult};
use crate::scope::ScopeKind;

/// 上下文状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Active,
    Inactive,
    Destroyed,
}

/// 实例创建闭包（由拦截运行时包装 post-construct 链后传入）
pub type InstanceCreator<'a> =
    &'a (dyn Fn(&mut CreationalContext) -> ContainerResult<BeanInstance> + 'a);

struct StoredInstance {
    instance: BeanInstance,
    creational: CreationalContext,
    destroy: Option<DestroyFn>,
    bean_name: String,
    seq: usize,
}

/// 作用域上下文的抽象
pub trait Context: Send + Sync {
    /// 本上下文服务的作用域
    fn scope(&self) -> ScopeKind;

    fn state(&self) -> ContextState;

    fn is_active(&self) -> bool {
        self.state() == ContextState::Active
    }

    /// 返回已存在的实例；不创建
    fn get(&self, bean: &BeanDefinition) -> ContainerResult<Option<BeanInstance>>;

    /// 返回已存在的实例，否则创建、存储并返回新实例
    ///
    /// 并发首次创建同一 Bean 时，恰好一个实例存活（双重检查）。
    fn get_or_create(
        &self,
        bean: &BeanDefinition,
        create: InstanceCreator<'_>,
        destroy: Option<DestroyFn>,
    ) -> ContainerResult<BeanInstance>;

    /// 销毁全部 contextual 实例并终结本上下文
    fn destroy(&self);
}

/// 正常作用域的默认上下文实现
pub struct DefaultContext {
    scope: ScopeKind,
    state: RwLock<ContextState>,
    instances: Mutex<HashMap<BeanId, StoredInstance>>,
    creation_seq: AtomicUsize,
}

impl DefaultContext {
    pub fn new(scope: ScopeKind) -> Self {
        Self {
            scope,
            state: RwLock::new(ContextState::Uninitialized),
            instances: Mutex::new(HashMap::new()),
            creation_seq: AtomicUsize::new(0),
        }
    }

    /// uninitialized/inactive → active
    pub fn activate(&self) {
        let mut state = self.state.write();
        match *state {
            ContextState::Uninitialized | ContextState::Inactive => {
                *state = ContextState::Active;
            }
            ContextState::Active => {}
            ContextState::Destroyed => {
                tracing::warn!("Ignoring activate on destroyed {:?} context", self.scope);
            }
        }
    }

    /// active → inactive（实例保留，访问被拒绝）
    pub fn deactivate(&self) {
        let mut state = self.state.write();
        if *state == ContextState::Active {
            *state = ContextState::Inactive;
        }
    }

    fn ensure_active(&self) -> ContainerResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ContainerError::ContextNotActive(self.scope))
        }
    }

    /// 活跃实例数（诊断用）
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }
}

impl Context for DefaultContext {
    fn scope(&self) -> ScopeKind {
        self.scope
    }

    fn state(&self) -> ContextState {
        *self.state.read()
    }

    fn get(&self, bean: &BeanDefinition) -> ContainerResult<Option<BeanInstance>> {
        self.ensure_active()?;
        Ok(self
            .instances
            .lock()
            .get(&bean.id())
            .map(|stored| Arc::clone(&stored.instance)))
    }

    fn get_or_create(
        &self,
        bean: &BeanDefinition,
        create: InstanceCreator<'_>,
        destroy: Option<DestroyFn>,
    ) -> ContainerResult<BeanInstance> {
        self.ensure_active()?;

        if let Some(stored) = self.instances.lock().get(&bean.id()) {
            return Ok(Arc::clone(&stored.instance));
        }

        // 在锁外创建：Bean 的创建闭包可能递归进入本上下文解析依赖
        let mut creational = CreationalContext::new();
        let instance = create(&mut creational)?;

        let mut instances = self.instances.lock();
        if let Some(winner) = instances.get(&bean.id()) {
            // 并发首次创建竞争失败：丢弃本方实例，保持
            // 「每个 contextual 在活跃作用域内至多一个存活实例」
            let winner = Arc::clone(&winner.instance);
            drop(instances);
            if let Some(destroy) = &destroy {
                destroy(&instance);
            }
            creational.release();
            return Ok(winner);
        }

        tracing::debug!(
            "Created contextual instance of '{}' in {:?} scope",
            bean.name(),
            self.scope
        );
        instances.insert(
            bean.id(),
            StoredInstance {
                instance: Arc::clone(&instance),
                creational,
                destroy,
                bean_name: bean.name().to_string(),
                seq: self.creation_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        Ok(instance)
    }

    fn destroy(&self) {
        {
            let mut state = self.state.write();
            if *state == ContextState::Destroyed {
                return;
            }
            *state = ContextState::Destroyed;
        }

        let mut drained: Vec<StoredInstance> = self.instances.lock().drain().map(|(_, v)| v).collect();
        // 按创建逆序销毁
        drained.sort_by(|a, b| b.seq.cmp(&a.seq));

        tracing::debug!(
            "Destroying {:?} context with {} instance(s)",
            self.scope,
            drained.len()
        );
        for mut stored in drained {
            if let Some(destroy) = &stored.destroy {
                destroy(&stored.instance);
            }
            stored.creational.release();
            tracing::trace!("Destroyed contextual instance of '{}'", stored.bean_name);
        }
    }
}

/// 按作用域管理当前上下文
///
/// 生命周期钩子 `init`/`destroy` 由外围容器生命周期调用（web 监听器、
/// 独立引导等），是外部协作方接触核心的唯一入口。
pub struct ContextsService {
    request: RwLock<HashMap<ThreadId, Arc<DefaultContext>>>,
    session: RwLock<HashMap<String, Arc<DefaultContext>>>,
    thread_sessions: RwLock<HashMap<ThreadId, String>>,
    application: RwLock<Arc<DefaultContext>>,
    singleton: RwLock<Arc<DefaultContext>>,
}

impl ContextsService {
    pub fn new() -> Self {
        Self {
            request: RwLock::new(HashMap::new()),
            session: RwLock::new(HashMap::new()),
            thread_sessions: RwLock::new(HashMap::new()),
            application: RwLock::new(Arc::new(DefaultContext::new(ScopeKind::Application))),
            singleton: RwLock::new(Arc::new(DefaultContext::new(ScopeKind::Singleton))),
        }
    }

    /// 容器启动钩子：激活应用与单例上下文
    pub fn init(&self) {
        self.application.read().activate();
        self.singleton.read().activate();
        tracing::info!("Contexts service initialized");
    }

    /// 容器关闭钩子：销毁全部上下文
    pub fn destroy(&self) {
        for (_, ctx) in self.request.write().drain() {
            ctx.destroy();
        }
        self.thread_sessions.write().clear();
        for (_, ctx) in self.session.write().drain() {
            ctx.destroy();
        }
        self.application.read().destroy();
        self.singleton.read().destroy();
        tracing::info!("Contexts service destroyed");
    }

    /// 启动一个作用域上下文
    ///
    /// 请求作用域以当前线程为边界；会话作用域需要显式 `key`（会话 id），
    /// 并同时与当前线程关联。
    pub fn start_context(
        &self,
        scope: ScopeKind,
        key: Option<&str>,
    ) -> ContainerResult<Arc<DefaultContext>> {
        match scope {
            ScopeKind::Request => {
                let ctx = Arc::new(DefaultContext::new(ScopeKind::Request));
                ctx.activate();
                self.request.write().insert(thread::current().id(), Arc::clone(&ctx));
                tracing::trace!("Started request context on {:?}", thread::current().id());
                Ok(ctx)
            }
            ScopeKind::Session => {
                let session_id = key.ok_or_else(|| {
                    ContainerError::Configuration(
                        "session context requires a session id".to_string(),
                    )
                })?;
                let ctx = {
                    let mut sessions = self.session.write();
                    // 会话存储在首次使用时惰性创建
                    Arc::clone(
                        sessions
                            .entry(session_id.to_string())
                            .or_insert_with(|| Arc::new(DefaultContext::new(ScopeKind::Session))),
                    )
                };
                ctx.activate();
                self.thread_sessions
                    .write()
                    .insert(thread::current().id(), session_id.to_string());
                tracing::trace!("Started session context '{}'", session_id);
                Ok(ctx)
            }
            ScopeKind::Application => {
                let mut slot = self.application.write();
                if slot.state() == ContextState::Destroyed {
                    *slot = Arc::new(DefaultContext::new(ScopeKind::Application));
                }
                slot.activate();
                Ok(Arc::clone(&slot))
            }
            ScopeKind::Singleton => {
                let mut slot = self.singleton.write();
                if slot.state() == ContextState::Destroyed {
                    *slot = Arc::new(DefaultContext::new(ScopeKind::Singleton));
                }
                slot.activate();
                Ok(Arc::clone(&slot))
            }
            ScopeKind::Dependent => Err(ContainerError::Configuration(
                "dependent pseudo-scope has no shared context".to_string(),
            )),
        }
    }

    /// 结束一个作用域上下文，销毁其全部实例并移除存储
    pub fn end_context(&self, scope: ScopeKind, key: Option<&str>) -> ContainerResult<()> {
        match scope {
            ScopeKind::Request => {
                if let Some(ctx) = self.request.write().remove(&thread::current().id()) {
                    ctx.destroy();
                }
                Ok(())
            }
            ScopeKind::Session => {
                let session_id = match key {
                    Some(id) => id.to_string(),
                    None => self
                        .thread_sessions
                        .read()
                        .get(&thread::current().id())
                        .cloned()
                        .ok_or(ContainerError::ContextNotActive(ScopeKind::Session))?,
                };
                self.thread_sessions
                    .write()
                    .retain(|_, bound| bound != &session_id);
                if let Some(ctx) = self.session.write().remove(&session_id) {
                    ctx.destroy();
                }
                Ok(())
            }
            ScopeKind::Application => {
                self.application.read().destroy();
                Ok(())
            }
            ScopeKind::Singleton => {
                self.singleton.read().destroy();
                Ok(())
            }
            ScopeKind::Dependent => Err(ContainerError::Configuration(
                "dependent pseudo-scope has no shared context".to_string(),
            )),
        }
    }

    /// 返回调用线程当前的上下文
    ///
    /// `create_if_not_exists` 为真时，不存在的请求上下文会被创建。
    pub fn get_current_context(
        &self,
        scope: ScopeKind,
        create_if_not_exists: bool,
    ) -> Option<Arc<DefaultContext>> {
        match scope {
            ScopeKind::Request => {
                if let Some(ctx) = self.request.read().get(&thread::current().id()) {
                    return Some(Arc::clone(ctx));
                }
                if create_if_not_exists {
                    self.start_context(ScopeKind::Request, None).ok()
                } else {
                    None
                }
            }
            ScopeKind::Session => {
                let session_id = self
                    .thread_sessions
                    .read()
                    .get(&thread::current().id())
                    .cloned()?;
                self.session.read().get(&session_id).cloned()
            }
            ScopeKind::Application => Some(Arc::clone(&self.application.read())),
            ScopeKind::Singleton => Some(Arc::clone(&self.singleton.read())),
            ScopeKind::Dependent => None,
        }
    }

    /// 返回活跃的当前上下文，否则报 `ContextNotActive`
    pub fn require_context(&self, scope: ScopeKind) -> ContainerResult<Arc<DefaultContext>> {
        self.get_current_context(scope, false)
            .filter(|ctx| ctx.is_active())
            .ok_or(ContainerError::ContextNotActive(scope))
    }
}

impl Default for ContextsService {
    fn default() -> Self {
        Self::new()
    }
}
