//! 创建上下文
//!
//! 每次顶层 `get`/`create` 调用对应一个 `CreationalContext`，追踪为构建
//! 该实例而创建的全部 dependent 实例。上下文释放时按创建的逆序销毁
//! 它们——这是 RAII 纪律在 contextual 实例图上的应用。

use crate::bean::{BeanInstance, DestroyFn};

struct DependentInstance {
    bean_name: String,
    instance: BeanInstance,
    destroy: Option<DestroyFn>,
}

/// 单次创建调用的作用域化资源追踪
#[derive(Default)]
pub struct CreationalContext {
    dependents: Vec<DependentInstance>,
    released: bool,
}

impl CreationalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个依附于本次创建的 dependent 实例
    pub fn push_dependent(
        &mut self,
        bean_name: impl Into<String>,
        instance: BeanInstance,
        destroy: Option<DestroyFn>,
    ) {
        self.dependents.push(DependentInstance {
            bean_name: bean_name.into(),
            instance,
            destroy,
        });
    }

    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// 按创建的逆序销毁全部 dependent 实例
    ///
    /// 幂等：重复调用只生效一次。
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        while let Some(dependent) = self.dependents.pop() {
            tracing::trace!("Destroying dependent instance '{}'", dependent.bean_name);
            if let Some(destroy) = &dependent.destroy {
                destroy(&dependent.instance);
            }
        }
    }
}

impl Drop for CreationalContext {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_release_destroys_in_reverse_order() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let mut creational = CreationalContext::new();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            creational.push_dependent(
                name,
                Arc::new(()) as BeanInstance,
                Some(Arc::new(move |_| {
                    order.lock().unwrap().push(name);
                })),
            );
        }

        creational.release();
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let count = Arc::new(Mutex::new(0u32));
        let mut creational = CreationalContext::new();
        {
            let count = Arc::clone(&count);
            creational.push_dependent(
                "only",
                Arc::new(()) as BeanInstance,
                Some(Arc::new(move |_| {
                    *count.lock().unwrap() += 1;
                })),
            );
        }

        creational.release();
        creational.release();
        drop(creational);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_drop_releases_dependents() {
        let count = Arc::new(Mutex::new(0u32));
        {
            let mut creational = CreationalContext::new();
            let count = Arc::clone(&count);
            creational.push_dependent(
                "only",
                Arc::new(()) as BeanInstance,
                Some(Arc::new(move |_| {
                    *count.lock().unwrap() += 1;
                })),
            );
        }
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
