//! 拦截 SPI
//!
//! 拦截器与装饰器编写时依赖的 trait 和调用上下文类型。解析与派发引擎
//! 在 `trellis-intercept` 中实现，这里只定义契约：
//!
//! - `Interceptor`：环绕调用（around-invoke）及生命周期回调
//! - `Decorator`：按委托链包装业务接口的某些方法
//! - `InvocationContext`：单次调用内可变的上下文，支持 `proceed()` 语义
//! - `Invocable`:代理对象的统一动态派发界面

use std::any::Any;
use std::sync::Arc;

use crate::error::InvocationError;

/// 动态调用的参数表
pub type MethodArgs = Vec<Box<dyn Any + Send>>;

/// 动态调用的结果
pub type InvocationResult = Result<Box<dyn Any + Send>, InvocationError>;

/// 业务方法体：目标实例加参数表，产出结果
///
/// 方法体负责将 `target` 降转为具体类型；参数按位置取用。
pub type MethodBody =
    Arc<dyn Fn(&(dyn Any + Send + Sync), MethodArgs) -> InvocationResult + Send + Sync>;

/// EJB 风格的自拦截方法（声明在 Bean 自身类上的 around-invoke）
pub type AroundInvokeFn =
    Arc<dyn Fn(&mut InvocationContext<'_>) -> InvocationResult + Send + Sync>;

/// 生命周期回调（post-construct / pre-destroy 的自拦截形式）
pub type LifecycleFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;

/// 拦截类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptionType {
    /// 环绕业务方法调用
    AroundInvoke,
    /// 实例构造完成后
    PostConstruct,
    /// 实例销毁前
    PreDestroy,
    /// 环绕超时回调（仅参与解析，容器不提供定时器服务）
    AroundTimeout,
}

/// 拦截器 trait
///
/// 默认实现处理 around-invoke 并直接 `proceed()`；生命周期回调默认为空。
pub trait Interceptor: Send + Sync {
    /// 拦截器名称（用于诊断与启用顺序配置）
    fn name(&self) -> &str;

    /// 本拦截器处理的拦截类型
    fn intercepts(&self) -> &[InterceptionType] {
        &[InterceptionType::AroundInvoke]
    }

    /// 环绕调用。实现可以修改参数、替换返回值，或不调用
    /// `proceed()` 直接短路。
    fn around_invoke(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult {
        ctx.proceed()
    }

    /// 实例构造后回调
    fn post_construct(&self, _target: &(dyn Any + Send + Sync)) {}

    /// 实例销毁前回调
    fn pre_destroy(&self, _target: &(dyn Any + Send + Sync)) {}
}

/// 装饰器 trait
///
/// 装饰器只覆盖它声明的方法；链中未覆盖某方法的装饰器对该方法透明。
/// 委托通过显式的 `Delegate` 句柄传入，而不是自引用的对象图。
pub trait Decorator: Send + Sync {
    /// 装饰器名称
    fn name(&self) -> &str;

    /// 本装饰器覆盖的方法名
    fn decorated_methods(&self) -> Vec<&'static str>;

    /// 调用被覆盖的方法。实现通过 `delegate.proceed(args)` 调用
    /// 链上的下一层（下一个装饰器或真实实例）。
    fn invoke(
        &self,
        method: &str,
        delegate: &mut Delegate<'_>,
        args: MethodArgs,
    ) -> InvocationResult;
}

/// 装饰器链的委托句柄
///
/// 链以「有序列表 + 游标」建模：第一个覆盖当前方法的装饰器最先执行，
/// 每层通过 `proceed` 前进，链尾落到真实实例的方法体。
pub struct Delegate<'a> {
    chain: &'a [Arc<dyn Decorator>],
    position: usize,
    method: &'a str,
    target: &'a (dyn Any + Send + Sync),
    terminal: &'a MethodBody,
}

impl<'a> Delegate<'a> {
    pub fn new(
        chain: &'a [Arc<dyn Decorator>],
        method: &'a str,
        target: &'a (dyn Any + Send + Sync),
        terminal: &'a MethodBody,
    ) -> Self {
        Self {
            chain,
            position: 0,
            method,
            target,
            terminal,
        }
    }

    /// 真实实例（供装饰器读取状态）
    pub fn target(&self) -> &(dyn Any + Send + Sync) {
        self.target
    }

    /// 调用链上的下一层
    ///
    /// 跳过不覆盖当前方法的装饰器；链尾执行真实方法体。
    pub fn proceed(&mut self, args: MethodArgs) -> InvocationResult {
        let method = self.method;
        while self.position < self.chain.len() {
            let index = self.position;
            self.position += 1;
            let decorator = Arc::clone(&self.chain[index]);
            if decorator.decorated_methods().iter().any(|m| *m == method) {
                return decorator.invoke(method, self, args);
            }
        }
        (self.terminal)(self.target, args)
    }
}

/// 单次调用的可变上下文
///
/// 栈本地，从不跨线程或跨调用共享。`proceed()` 前进到链上的下一个
/// 拦截器；链尾执行终端延续（装饰器链 + 真实方法）。
pub struct InvocationContext<'a> {
    target: &'a (dyn Any + Send + Sync),
    method: &'a str,
    parameters: MethodArgs,
    chain: &'a [Arc<dyn Interceptor>],
    position: usize,
    terminal: &'a dyn Fn(&(dyn Any + Send + Sync), MethodArgs) -> InvocationResult,
}

impl<'a> InvocationContext<'a> {
    pub fn new(
        target: &'a (dyn Any + Send + Sync),
        method: &'a str,
        parameters: MethodArgs,
        chain: &'a [Arc<dyn Interceptor>],
        terminal: &'a dyn Fn(&(dyn Any + Send + Sync), MethodArgs) -> InvocationResult,
    ) -> Self {
        Self {
            target,
            method,
            parameters,
            chain,
            position: 0,
            terminal,
        }
    }

    /// 被调用的方法名
    pub fn method(&self) -> &str {
        self.method
    }

    /// 目标实例
    pub fn target(&self) -> &(dyn Any + Send + Sync) {
        self.target
    }

    /// 当前参数表
    pub fn parameters(&self) -> &MethodArgs {
        &self.parameters
    }

    /// 可变参数表（拦截器可原位修改）
    pub fn parameters_mut(&mut self) -> &mut MethodArgs {
        &mut self.parameters
    }

    /// 整体替换参数表
    pub fn set_parameters(&mut self, parameters: MethodArgs) {
        self.parameters = parameters;
    }

    /// 前进到链上的下一个元素
    ///
    /// 业务异常原样向上传播；拦截器捕获后不再传播即视为抑制。
    pub fn proceed(&mut self) -> InvocationResult {
        if self.position < self.chain.len() {
            let index = self.position;
            self.position += 1;
            let interceptor = Arc::clone(&self.chain[index]);
            interceptor.around_invoke(self)
        } else {
            let parameters = std::mem::take(&mut self.parameters);
            (self.terminal)(self.target, parameters)
        }
    }
}

/// 代理对象的动态派发界面
///
/// 拦截/装饰代理与客户端代理都实现此 trait；标记方法用于解包时
/// 区分代理与普通对象。
pub trait Invocable: Send + Sync {
    /// 按方法名派发一次调用
    fn invoke(&self, method: &str, args: MethodArgs) -> InvocationResult;

    /// 是否为拦截/装饰代理
    fn is_intercepted_proxy(&self) -> bool {
        false
    }

    /// 是否为正常作用域的客户端代理
    fn is_client_proxy(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubling;

    impl Interceptor for Doubling {
        fn name(&self) -> &str {
            "Doubling"
        }

        fn around_invoke(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult {
            let result = ctx.proceed()?;
            let value = *result
                .downcast::<i32>()
                .map_err(|_| InvocationError::Container("unexpected return type".into()))?;
            Ok(Box::new(value * 2))
        }
    }

    struct ShortCircuit;

    impl Interceptor for ShortCircuit {
        fn name(&self) -> &str {
            "ShortCircuit"
        }

        fn around_invoke(&self, _ctx: &mut InvocationContext<'_>) -> InvocationResult {
            // 不调用 proceed，直接替换返回值
            Ok(Box::new(-1i32))
        }
    }

    fn identity_terminal() -> impl Fn(&(dyn Any + Send + Sync), MethodArgs) -> InvocationResult {
        |_target, mut args| {
            let first = args.remove(0);
            let value = *first
                .downcast::<i32>()
                .map_err(|_| InvocationError::Container("unexpected argument type".into()))?;
            Ok(Box::new(value))
        }
    }

    #[test]
    fn test_proceed_reaches_terminal() {
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Doubling)];
        let terminal = identity_terminal();
        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        let mut ctx = InvocationContext::new(
            target.as_ref(),
            "echo",
            vec![Box::new(21i32)],
            &chain,
            &terminal,
        );
        let result = ctx.proceed().unwrap();
        assert_eq!(*result.downcast::<i32>().unwrap(), 42);
    }

    #[test]
    fn test_interceptor_can_short_circuit() {
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(ShortCircuit), Arc::new(Doubling)];
        let terminal = identity_terminal();
        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        let mut ctx = InvocationContext::new(
            target.as_ref(),
            "echo",
            vec![Box::new(21i32)],
            &chain,
            &terminal,
        );
        // ShortCircuit 在链首，后续拦截器与终端都不会执行
        let result = ctx.proceed().unwrap();
        assert_eq!(*result.downcast::<i32>().unwrap(), -1);
    }

    #[test]
    fn test_parameter_replacement_is_visible_downstream() {
        struct Rewriter;
        impl Interceptor for Rewriter {
            fn name(&self) -> &str {
                "Rewriter"
            }
            fn around_invoke(&self, ctx: &mut InvocationContext<'_>) -> InvocationResult {
                ctx.set_parameters(vec![Box::new(7i32)]);
                ctx.proceed()
            }
        }

        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Rewriter)];
        let terminal = identity_terminal();
        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        let mut ctx = InvocationContext::new(
            target.as_ref(),
            "echo",
            vec![Box::new(100i32)],
            &chain,
            &terminal,
        );
        let result = ctx.proceed().unwrap();
        assert_eq!(*result.downcast::<i32>().unwrap(), 7);
    }

    #[test]
    fn test_business_error_propagates_unmodified() {
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Doubling)];
        let terminal = |_target: &(dyn Any + Send + Sync), _args: MethodArgs| {
            Err(InvocationError::business_msg("boom"))
        };
        let target: Arc<dyn Any + Send + Sync> = Arc::new(());
        let mut ctx = InvocationContext::new(target.as_ref(), "echo", vec![], &chain, &terminal);
        let err = ctx.proceed().unwrap_err();
        assert!(!err.is_container_failure());
        assert_eq!(err.to_string(), "boom");
    }
}
