use std::sync::Arc;

use crate::handler::HandlerProvider;

/// Decorates a whole handler set, producing a new one that delegates to it.
pub trait HandlerWrapper: Send + Sync {
    fn wrap(&self, inner: Arc<dyn HandlerProvider>) -> Arc<dyn HandlerProvider>;
}

/// Build the final handler set from `base` and an ordered list of wrappers.
///
/// The first listed wrapper ends up outermost: its pre-phase runs first and
/// its post-phase last. `None` slots are skipped. With no wrappers present
/// the very same `base` is returned.
pub fn compose(
    base: Arc<dyn HandlerProvider>,
    wrappers: Vec<Option<Arc<dyn HandlerWrapper>>>,
) -> Arc<dyn HandlerProvider> {
    wrappers
        .into_iter()
        .rev()
        .flatten()
        .fold(base, |handlers, wrapper| wrapper.wrap(handlers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerResult;
    use crate::model::{ApiEvent, ApiResponse, InvocationContext};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct Base {
        log: CallLog,
    }

    #[async_trait]
    impl HandlerProvider for Base {
        async fn current(&self, _event: &ApiEvent, _ctx: &InvocationContext) -> HandlerResult {
            self.log.lock().unwrap().push("H.current".into());
            Ok(Some(ApiResponse::new(StatusCode::OK, "current")))
        }

        async fn historical(&self, _event: &ApiEvent, _ctx: &InvocationContext) -> HandlerResult {
            self.log.lock().unwrap().push("H.historical".into());
            Ok(Some(ApiResponse::new(StatusCode::OK, "historical")))
        }
    }

    struct Recorder {
        name: &'static str,
        log: CallLog,
    }

    struct Traced {
        name: &'static str,
        log: CallLog,
        inner: Arc<dyn HandlerProvider>,
    }

    impl HandlerWrapper for Recorder {
        fn wrap(&self, inner: Arc<dyn HandlerProvider>) -> Arc<dyn HandlerProvider> {
            Arc::new(Traced { name: self.name, log: self.log.clone(), inner })
        }
    }

    impl Traced {
        fn push(&self, phase: &str) {
            self.log.lock().unwrap().push(format!("{}.{phase}", self.name));
        }
    }

    #[async_trait]
    impl HandlerProvider for Traced {
        async fn current(&self, event: &ApiEvent, ctx: &InvocationContext) -> HandlerResult {
            self.push("pre");
            let result = self.inner.current(event, ctx).await;
            self.push("post");
            result
        }

        async fn historical(&self, event: &ApiEvent, ctx: &InvocationContext) -> HandlerResult {
            self.push("pre");
            let result = self.inner.historical(event, ctx).await;
            self.push("post");
            result
        }
    }

    fn wrapper(name: &'static str, log: &CallLog) -> Option<Arc<dyn HandlerWrapper>> {
        Some(Arc::new(Recorder { name, log: log.clone() }))
    }

    #[tokio::test]
    async fn first_wrapper_is_outermost() {
        let log = CallLog::default();
        let base: Arc<dyn HandlerProvider> = Arc::new(Base { log: log.clone() });

        let handlers = compose(base, vec![wrapper("A", &log), wrapper("B", &log)]);
        let response = handlers
            .current(&ApiEvent::default(), &InvocationContext::default())
            .await
            .unwrap();

        assert_eq!(response.map(|r| r.body).as_deref(), Some("current"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A.pre", "B.pre", "H.current", "B.post", "A.post"]
        );
    }

    #[tokio::test]
    async fn absent_wrappers_are_skipped() {
        let log = CallLog::default();
        let base: Arc<dyn HandlerProvider> = Arc::new(Base { log: log.clone() });

        let handlers = compose(base, vec![None, wrapper("A", &log), None, wrapper("B", &log)]);
        handlers
            .historical(&ApiEvent::default(), &InvocationContext::default())
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["A.pre", "B.pre", "H.historical", "B.post", "A.post"]
        );
    }

    #[test]
    fn no_wrappers_returns_base_itself() {
        let base: Arc<dyn HandlerProvider> = Arc::new(Base { log: CallLog::default() });

        let composed = compose(base.clone(), Vec::new());
        assert!(Arc::ptr_eq(&base, &composed));

        let composed = compose(base.clone(), vec![None, None]);
        assert!(Arc::ptr_eq(&base, &composed));
    }
}
