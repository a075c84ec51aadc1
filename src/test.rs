use super::*;

/// Test doubles for the client seams plus a capture of the diagnostic output
pub(crate) mod fake {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq)]
    pub enum Path {
        Ambient { region: String },
        Explicit { access_key_id: String, region: String },
    }

    #[derive(Clone, Debug)]
    pub enum Behavior {
        Succeed,
        FailConstruction,
        PanicConstruction,
        ServiceError { request_id: &'static str, status_code: u16 },
        TransportError,
        Panic,
    }

    #[derive(Clone)]
    pub struct FakeFactory {
        behavior: Behavior,
        requests: Arc<Mutex<Vec<PutMetricDataRequest>>>,
        paths: Arc<Mutex<Vec<Path>>>,
    }

    impl FakeFactory {
        pub fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                requests: Default::default(),
                paths: Default::default(),
            }
        }

        pub fn requests(&self) -> Vec<PutMetricDataRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn paths(&self) -> Vec<Path> {
            self.paths.lock().unwrap().clone()
        }

        fn client(&self) -> Result<Box<dyn MetricsClient>, Error> {
            match self.behavior {
                Behavior::FailConstruction => Err("invalid AWS region \"mars-1\"".into()),
                Behavior::PanicConstruction => panic!("credential chain exploded"),
                _ => Ok(Box::new(FakeClient {
                    behavior: self.behavior.clone(),
                    requests: self.requests.clone(),
                })),
            }
        }
    }

    impl ClientFactory for FakeFactory {
        fn ambient(&self, region: &str, _endpoint_url: Option<&str>) -> Result<Box<dyn MetricsClient>, Error> {
            self.paths.lock().unwrap().push(Path::Ambient {
                region: region.to_owned(),
            });
            self.client()
        }

        fn explicit(
            &self,
            credentials: &Credentials,
            region: &str,
            _endpoint_url: Option<&str>,
        ) -> Result<Box<dyn MetricsClient>, Error> {
            self.paths.lock().unwrap().push(Path::Explicit {
                access_key_id: credentials.access_key_id.clone(),
                region: region.to_owned(),
            });
            self.client()
        }
    }

    struct FakeClient {
        behavior: Behavior,
        requests: Arc<Mutex<Vec<PutMetricDataRequest>>>,
    }

    impl MetricsClient for FakeClient {
        fn put_metric_data(&self, request: &PutMetricDataRequest) -> Result<PutMetricDataResponse, SubmitError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.behavior {
                Behavior::Succeed | Behavior::FailConstruction | Behavior::PanicConstruction => {
                    Ok(PutMetricDataResponse {
                        status_code: Some(200),
                        request_id: Some("ok-1".into()),
                    })
                }
                Behavior::ServiceError {
                    request_id,
                    status_code,
                } => Err(SubmitError::Service {
                    request_id: Some(request_id.to_owned()),
                    error_type: "InternalServiceFault".into(),
                    status_code: Some(status_code),
                    message: "Internal service failure".into(),
                }),
                Behavior::TransportError => Err(SubmitError::Transport("connection refused".into())),
                Behavior::Panic => panic!("client exploded"),
            }
        }
    }

    /// fmt subscriber writing into a shared buffer
    #[derive(Clone, Default)]
    pub struct Diagnostics(Arc<Mutex<Vec<u8>>>);

    impl Diagnostics {
        pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_max_level(tracing::Level::TRACE)
                .finish()
        }

        pub fn output(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Diagnostics {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Diagnostics {
        type Writer = Diagnostics;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{Behavior, Diagnostics, FakeFactory, Path};
    use super::*;
    use chrono::Utc;
    use rusty_fork::rusty_fork_test;
    use std::sync::Arc;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn builder(factory: &FakeFactory) -> Builder {
        Builder::new()
            .namespace("App")
            .metric_name("Errors")
            .unit(Unit::Count)
            .value(1.0)
            .client_factory(factory.clone())
    }

    fn event(message: &str) -> LogEvent {
        LogEvent::new(Level::ERROR, "checkout", message)
    }

    #[test]
    fn ambient_credentials_request() {
        let factory = FakeFactory::new(Behavior::Succeed);
        let target = builder(&factory).init().unwrap();
        assert_eq!(target.state(), State::Ready { client: true });

        let before = Utc::now();
        target.write(&event("payment failed"));
        let after = Utc::now();

        assert_eq!(
            factory.paths(),
            vec![Path::Ambient {
                region: "us-east-1".into()
            }]
        );

        let requests = factory.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].namespace, "App");
        assert_eq!(requests[0].metric_data.len(), 1);

        let datum = &requests[0].metric_data[0];
        assert_eq!(datum.metric_name, "Errors");
        assert_eq!(datum.unit, Unit::Count);
        assert_eq!(datum.value, 1.0);
        assert!(before <= datum.timestamp && datum.timestamp <= after);
    }

    #[test]
    fn credential_path_selection() {
        let factory = FakeFactory::new(Behavior::Succeed);
        builder(&factory)
            .credentials("AKID", "secret")
            .region("eu-west-1")
            .init()
            .unwrap();
        builder(&factory).credentials("AKID", "").init().unwrap();
        builder(&factory).credentials("", "").init().unwrap();

        assert_eq!(
            factory.paths(),
            vec![
                Path::Explicit {
                    access_key_id: "AKID".into(),
                    region: "eu-west-1".into()
                },
                Path::Ambient {
                    region: "us-east-1".into()
                },
                Path::Ambient {
                    region: "us-east-1".into()
                },
            ]
        );
    }

    #[test]
    fn initialize_runs_once() {
        let factory = FakeFactory::new(Behavior::Succeed);
        let target = builder(&factory).build_target().unwrap();
        assert_eq!(target.state(), State::Uninitialized);

        target.initialize();
        target.initialize();
        assert_eq!(factory.paths().len(), 1);
    }

    #[test]
    fn failed_construction_is_swallowed() {
        let diagnostics = Diagnostics::default();
        let factory = FakeFactory::new(Behavior::FailConstruction);

        let target = tracing::subscriber::with_default(diagnostics.subscriber(), || {
            let target = builder(&factory).init().unwrap();
            target.write(&event("payment failed"));
            target
        });

        assert_eq!(target.state(), State::Ready { client: false });
        assert!(factory.requests().is_empty());

        let output = diagnostics.output();
        assert!(output.contains("CloudWatch client failed to be configured"));
        assert!(output.contains("mars-1"));
        assert!(output.contains("no metrics client"));
    }

    #[test]
    fn panicking_construction_is_swallowed() {
        let diagnostics = Diagnostics::default();
        let factory = FakeFactory::new(Behavior::PanicConstruction);

        let (target, layered) = tracing::subscriber::with_default(diagnostics.subscriber(), || {
            let target = builder(&factory).build_target().unwrap();
            target.initialize();
            target.write(&event("payment failed"));

            // stacking onto a subscriber initializes as well
            let layered = tracing_subscriber::registry().with(builder(&factory).build_target().unwrap());
            (target, layered)
        });
        drop(layered);

        assert_eq!(target.state(), State::Ready { client: false });
        assert_eq!(factory.paths().len(), 2);
        assert!(factory.requests().is_empty());

        let output = diagnostics.output();
        assert!(output.contains("CloudWatch client failed to be configured"));
        assert!(output.contains("credential chain exploded"));
        assert!(output.contains("no metrics client"));

        target.initialize();
        assert_eq!(factory.paths().len(), 2);
    }

    #[test]
    fn service_error_is_logged_with_request_id() {
        let diagnostics = Diagnostics::default();
        let factory = FakeFactory::new(Behavior::ServiceError {
            request_id: "R1",
            status_code: 500,
        });
        let target = builder(&factory).init().unwrap();

        tracing::subscriber::with_default(diagnostics.subscriber(), || {
            target.write(&event("payment failed"));
        });

        assert_eq!(factory.requests().len(), 1);
        let output = diagnostics.output();
        assert!(output.contains("R1"));
        assert!(output.contains("status_code=500"));
        assert!(output.contains("InternalServiceFault"));
        assert!(output.contains("Failed to send metric to CloudWatch"));
    }

    #[test]
    fn write_never_propagates_failures() {
        let diagnostics = Diagnostics::default();
        tracing::subscriber::with_default(diagnostics.subscriber(), || {
            // never initialized
            let factory = FakeFactory::new(Behavior::Succeed);
            builder(&factory).build_target().unwrap().write(&event("a"));
            assert!(factory.requests().is_empty());

            // layout fails
            let factory = FakeFactory::new(Behavior::Succeed);
            builder(&factory)
                .layout(|_: &LogEvent| -> Result<String, Error> { Err("unknown renderer ${nope}".into()) })
                .init()
                .unwrap()
                .write(&event("b"));
            assert!(factory.requests().is_empty());

            // layout panics
            let factory = FakeFactory::new(Behavior::Succeed);
            builder(&factory)
                .layout(|_: &LogEvent| -> Result<String, Error> { panic!("layout exploded") })
                .init()
                .unwrap()
                .write(&event("c"));
            assert!(factory.requests().is_empty());

            for behavior in [Behavior::TransportError, Behavior::Panic] {
                let factory = FakeFactory::new(behavior);
                builder(&factory).init().unwrap().write(&event("d"));
                assert_eq!(factory.requests().len(), 1);
            }
        });

        let output = diagnostics.output();
        assert!(output.contains("target has not been initialized"));
        assert!(output.contains("unknown renderer"));
        assert!(output.contains("layout exploded"));
        assert!(output.contains("connection refused"));
        assert!(output.contains("client exploded"));
    }

    #[test]
    fn identity_is_static_across_events() {
        let factory = FakeFactory::new(Behavior::Succeed);
        let target = builder(&factory).init().unwrap();

        target.write(&event("first"));
        target.write(&LogEvent::new(Level::INFO, "inventory", "second").with_field("sku", "A-1"));
        target.write(&event(""));

        let requests = factory.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_eq!(request.namespace, "App");
            assert_eq!(request.metric_data.len(), 1);
            assert_eq!(request.metric_data[0].metric_name, "Errors");
            assert_eq!(request.metric_data[0].unit, Unit::Count);
            assert_eq!(request.metric_data[0].value, 1.0);
        }
    }

    #[test]
    fn concurrent_writes() {
        let factory = FakeFactory::new(Behavior::Succeed);
        let target = Arc::new(builder(&factory).init().unwrap());

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let target = target.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        target.write(&event(&format!("thread {thread} event {i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(factory.requests().len(), 80);
    }

    #[test]
    fn layer_forwards_each_event() {
        let factory = FakeFactory::new(Behavior::Succeed);
        let target = builder(&factory).build_target().unwrap();
        let subscriber = tracing_subscriber::registry().with(target);
        assert_eq!(factory.paths().len(), 1);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("cache warmed");
            tracing::warn!(attempt = 2, "retrying upstream");
        });

        let requests = factory.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].metric_data[0].metric_name, requests[1].metric_data[0].metric_name);
    }

    rusty_fork_test! {
        #[test]
        fn global_subscriber_skips_own_diagnostics() {
            let diagnostics = Diagnostics::default();
            let factory = FakeFactory::new(Behavior::Succeed);
            let target = builder(&factory).build_target().unwrap();

            let subscriber = tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(diagnostics.clone()))
                .with(target);
            tracing::subscriber::set_global_default(subscriber).unwrap();

            tracing::error!("payment failed");

            assert_eq!(factory.requests().len(), 1);
            let output = diagnostics.output();
            assert!(output.contains("payment failed"));
            assert!(output.contains("Sending metric data to CloudWatch"));
            assert!(output.contains("Metric data sent to CloudWatch"));
        }
    }
}
