//! 拦截派发
//!
//! 单次被拦截调用的执行顺序固定：自拦截方法在前、CDI 拦截器在后组成
//! 一条 around-invoke 链；链的终端是「装饰器链 + 真实方法体」这一个
//! 逻辑调用。每层拦截器通过 `InvocationContext::proceed()` 前进，装饰器
//! 通过 `Delegate::proceed()` 前进。

use std::any::Any;
use std::sync::Arc;

use trellis_core::interception::{
    AroundInvokeFn, Delegate, Interceptor, InvocationContext, InvocationResult, MethodArgs,
};
use trellis_core::metadata::{AnnotatedType, BusinessMethod};

use crate::resolution::MethodChains;

/// 把自拦截函数包装成拦截器，与 CDI 拦截器进入同一条链
struct SelfInterceptor {
    name: String,
    f: AroundInvokeFn,
}

impl Interceptor for SelfInterceptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn around_invoke(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult {
        (self.f)(ctx)
    }
}

/// 执行一次被拦截的业务方法调用
pub fn invoke_intercepted(
    ty: &AnnotatedType,
    chains: &MethodChains,
    target: &(dyn Any + Send + Sync),
    method: &BusinessMethod,
    args: MethodArgs,
) -> InvocationResult {
    // 合并链：自拦截先于 CDI 拦截器
    let mut chain: Vec<Arc<dyn Interceptor>> = Vec::with_capacity(
        ty.self_interception().around_invoke.len() + chains.interceptors.len(),
    );
    if chains.self_intercepted {
        for (index, f) in ty.self_interception().around_invoke.iter().enumerate() {
            chain.push(Arc::new(SelfInterceptor {
                name: format!("{}::around_invoke[{}]", ty.name(), index),
                f: Arc::clone(f),
            }));
        }
    }
    chain.extend(chains.interceptors.iter().cloned());

    let decorators = chains.decorators.clone();
    let body = Arc::clone(method.body());
    let method_name = method.name().to_string();

    // 终端延续：拦截器眼中的「业务方法」= 装饰器链 + 真实方法体
    let terminal = move |target: &(dyn Any + Send + Sync), args: MethodArgs| -> InvocationResult {
        if decorators.is_empty() {
            return body(target, args);
        }
        let mut delegate = Delegate::new(&decorators, &method_name, target, &body);
        delegate.proceed(args)
    };

    tracing::trace!(
        "Dispatching '{}::{}' through {} interceptor(s), {} decorator(s)",
        ty.name(),
        method.name(),
        chain.len(),
        chains.decorators.len()
    );
    let mut ctx = InvocationContext::new(target, method.name(), args, &chain, &terminal);
    ctx.proceed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use trellis_core::annotation::BindingSet;
    use trellis_core::error::InvocationError;
    use trellis_core::interception::{Decorator, MethodBody};

    fn recording_body(log: Arc<Mutex<Vec<String>>>) -> MethodBody {
        Arc::new(move |_target, _args| {
            log.lock().unwrap().push("target".to_string());
            Ok(Box::new(10i32))
        })
    }

    struct RecordingInterceptor {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for RecordingInterceptor {
        fn name(&self) -> &str {
            self.label
        }
        fn around_invoke(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult {
            self.log.lock().unwrap().push(format!("{}:before", self.label));
            let result = ctx.proceed();
            self.log.lock().unwrap().push(format!("{}:after", self.label));
            result
        }
    }

    struct RecordingDecorator {
        label: &'static str,
        methods: Vec<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Decorator for RecordingDecorator {
        fn name(&self) -> &str {
            self.label
        }
        fn decorated_methods(&self) -> Vec<&'static str> {
            self.methods.clone()
        }
        fn invoke(
            &self,
            _method: &str,
            delegate: &mut Delegate<'_>,
            args: MethodArgs,
        ) -> InvocationResult {
            self.log.lock().unwrap().push(self.label.to_string());
            delegate.proceed(args)
        }
    }

    fn type_with_method(log: Arc<Mutex<Vec<String>>>) -> Arc<AnnotatedType> {
        AnnotatedType::builder("Subject")
            .business_method("work", BindingSet::new(), recording_body(log))
            .build()
    }

    #[test]
    fn test_interceptors_wrap_decorator_chain_and_target() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let ty = type_with_method(Arc::clone(&log));
        let method = ty.method("work").unwrap();

        let chains = MethodChains {
            self_intercepted: false,
            interceptors: vec![Arc::new(RecordingInterceptor {
                label: "tx",
                log: Arc::clone(&log),
            })],
            decorators: vec![Arc::new(RecordingDecorator {
                label: "audit",
                methods: vec!["work"],
                log: Arc::clone(&log),
            })],
        };

        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        let result = invoke_intercepted(&ty, &chains, target.as_ref(), method, vec![]).unwrap();
        assert_eq!(*result.downcast::<i32>().unwrap(), 10);

        // 拦截器包裹「装饰器链 + 真实方法」这一个整体
        assert_eq!(
            *log.lock().unwrap(),
            vec!["tx:before", "audit", "target", "tx:after"]
        );
    }

    #[test]
    fn test_decorator_ordering_skips_non_overriding_layers() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let ty = type_with_method(Arc::clone(&log));
        let method = ty.method("work").unwrap();

        // d2 不覆盖 work，对本方法透明
        let chains = MethodChains {
            self_intercepted: false,
            interceptors: vec![],
            decorators: vec![
                Arc::new(RecordingDecorator {
                    label: "d1",
                    methods: vec!["work"],
                    log: Arc::clone(&log),
                }),
                Arc::new(RecordingDecorator {
                    label: "d2",
                    methods: vec!["other"],
                    log: Arc::clone(&log),
                }),
                Arc::new(RecordingDecorator {
                    label: "d3",
                    methods: vec!["work"],
                    log: Arc::clone(&log),
                }),
            ],
        };

        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        invoke_intercepted(&ty, &chains, target.as_ref(), method, vec![]).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["d1", "d3", "target"]);
    }

    #[test]
    fn test_decorator_overriding_nothing_is_transparent() {
        // 一个方法都不覆盖的抽象装饰器在链上对所有方法透明
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let ty = type_with_method(Arc::clone(&log));
        let method = ty.method("work").unwrap();

        let chains = MethodChains {
            self_intercepted: false,
            interceptors: vec![],
            decorators: vec![
                Arc::new(RecordingDecorator {
                    label: "d1",
                    methods: vec!["work"],
                    log: Arc::clone(&log),
                }),
                Arc::new(RecordingDecorator {
                    label: "silent",
                    methods: vec![],
                    log: Arc::clone(&log),
                }),
            ],
        };

        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        let result = invoke_intercepted(&ty, &chains, target.as_ref(), method, vec![]).unwrap();
        assert_eq!(*result.downcast::<i32>().unwrap(), 10);
        assert_eq!(*log.lock().unwrap(), vec!["d1", "target"]);
    }

    #[test]
    fn test_self_interceptors_precede_cdi_interceptors() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let self_log = Arc::clone(&log);
        let ty = AnnotatedType::builder("Subject")
            .self_around_invoke(Arc::new(move |ctx: &mut InvocationContext<'_>| {
                self_log.lock().unwrap().push("self:before".to_string());
                let result = ctx.proceed();
                self_log.lock().unwrap().push("self:after".to_string());
                result
            }))
            .business_method("work", BindingSet::new(), recording_body(Arc::clone(&log)))
            .build();
        let method = ty.method("work").unwrap();

        let chains = MethodChains {
            self_intercepted: true,
            interceptors: vec![Arc::new(RecordingInterceptor {
                label: "cdi",
                log: Arc::clone(&log),
            })],
            decorators: vec![],
        };

        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        invoke_intercepted(&ty, &chains, target.as_ref(), method, vec![]).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "self:before",
                "cdi:before",
                "target",
                "cdi:after",
                "self:after"
            ]
        );
    }

    #[test]
    fn test_business_error_passes_through_decorators_and_interceptors() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let ty = AnnotatedType::builder("Subject")
            .business_method(
                "work",
                BindingSet::new(),
                Arc::new(|_target, _args| Err(InvocationError::business_msg("declined"))),
            )
            .build();
        let method = ty.method("work").unwrap();

        let chains = MethodChains {
            self_intercepted: false,
            interceptors: vec![Arc::new(RecordingInterceptor {
                label: "tx",
                log: Arc::clone(&log),
            })],
            decorators: vec![Arc::new(RecordingDecorator {
                label: "audit",
                methods: vec!["work"],
                log: Arc::clone(&log),
            })],
        };

        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        let err = invoke_intercepted(&ty, &chains, target.as_ref(), method, vec![]).unwrap_err();
        assert!(!err.is_container_failure());
        assert_eq!(err.to_string(), "declined");
    }
}
