use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::base_session::BaseSession;
use crate::error::{Error, ErrorKind};
use crate::id_generator::IdGenerator;
use crate::message::{self, Message};
use crate::thread_pool::{Job, ThreadPool};
use crate::value::{Dict, List, Value};

/// Default ceiling for any wait-for-response (`.send()`, `leave()`).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const REASON_CLOSE_REALM: &str = "wamp.close.close_realm";
const REASON_GOODBYE_AND_OUT: &str = "wamp.close.goodbye_and_out";
const URI_RUNTIME_ERROR: &str = "wamp.error.runtime_error";

const CONNECTED: u8 = 0;
const LEAVING: u8 = 1;
const DISCONNECTED: u8 = 2;

/// The outcome a registered procedure handler hands back for an Invocation.
pub enum Invoke {
    Result(List, Dict),
    Error(String, List, Dict),
}

/// Handle to a registered procedure, returned by `RegisterRequest::send`.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub procedure: String,
    pub registration_id: u64,
}

/// Handle to an active subscription, returned by `SubscribeRequest::send`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub topic: String,
    pub subscription_id: u64,
}

/// The result of a completed call: positional and keyword return values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResult {
    pub args: List,
    pub kwargs: Dict,
}

pub type ProcedureHandler = Arc<dyn Fn(List, Dict) -> Invoke + Send + Sync + 'static>;
pub type EventHandler = Arc<dyn Fn(List, Dict) + Send + Sync + 'static>;

type Promise<T> = Sender<Result<T, Error>>;

#[derive(Default)]
struct PendingTables {
    call: Mutex<HashMap<u64, Promise<CallResult>>>,
    register: Mutex<HashMap<u64, (Promise<Registration>, String, ProcedureHandler)>>,
    unregister: Mutex<HashMap<u64, (Promise<()>, u64)>>,
    publish: Mutex<HashMap<u64, Promise<u64>>>,
    subscribe: Mutex<HashMap<u64, (Promise<Subscription>, String, EventHandler)>>,
    unsubscribe: Mutex<HashMap<u64, (Promise<()>, u64)>>,
    goodbye: Mutex<Option<Promise<()>>>,
}

struct Shared {
    base: BaseSession,
    state: AtomicU8,
    ids: IdGenerator,
    pending: PendingTables,
    registrations: Mutex<HashMap<u64, ProcedureHandler>>,
    subscriptions: Mutex<HashMap<u64, EventHandler>>,
    /// Submits Invocation/Event handler jobs to the pool. Deliberately not
    /// the `ThreadPool` itself: a dispatched job holds an `Arc<Shared>`
    /// clone (`reply_shared` below) to send its reply, and a `Sender` can be
    /// dropped from any thread without blocking. Owning the pool here would
    /// let a worker become the pool's last owner and `join()` itself on
    /// teardown; see `Session`'s own `pool` field and `Drop` impl.
    jobs: Sender<Job>,
    timeout: Duration,
}

impl Shared {
    fn state(&self) -> u8 {
        self.state.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.state() == CONNECTED {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::ConnectionClosed))
        }
    }

    /// Idempotent: only the first caller performs the transition and the
    /// pending-table rejection; later callers are no-ops.
    fn enter_disconnected(&self) {
        if self.state.swap(DISCONNECTED, Ordering::SeqCst) == DISCONNECTED {
            return;
        }
        let _ = self.base.shutdown_send();

        for (_, promise) in self.pending.call.lock().unwrap().drain() {
            let _ = promise.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
        for (_, (promise, _, _)) in self.pending.register.lock().unwrap().drain() {
            let _ = promise.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
        for (_, (promise, _)) in self.pending.unregister.lock().unwrap().drain() {
            let _ = promise.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
        for (_, promise) in self.pending.publish.lock().unwrap().drain() {
            let _ = promise.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
        for (_, (promise, _, _)) in self.pending.subscribe.lock().unwrap().drain() {
            let _ = promise.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
        for (_, (promise, _)) in self.pending.unsubscribe.lock().unwrap().drain() {
            let _ = promise.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
        if let Some(promise) = self.pending.goodbye.lock().unwrap().take() {
            let _ = promise.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
    }
}

/// A live WAMP session: the handshake has completed and the receive loop is
/// running. Dropping it tears the connection down (see module docs on the
/// concurrency model in `SPEC_FULL.md` §5).
pub struct Session {
    shared: Arc<Shared>,
    recv_thread: Option<JoinHandle<()>>,
    pool: ThreadPool,
}

impl Session {
    /// Takes ownership of an already-joined `BaseSession` and starts the
    /// receive loop. `pool_size` of `0` defaults to the available hardware
    /// concurrency.
    pub fn new(base: BaseSession, pool_size: usize, timeout: Duration) -> Session {
        let pool_size = if pool_size == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            pool_size
        };

        let pool = ThreadPool::new(pool_size);
        let jobs = pool.sender();

        let shared = Arc::new(Shared {
            base,
            state: AtomicU8::new(CONNECTED),
            ids: IdGenerator::new(),
            pending: PendingTables::default(),
            registrations: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            jobs,
            timeout,
        });

        let loop_shared = Arc::clone(&shared);
        let recv_thread = thread::Builder::new()
            .name("xconn-recv".to_string())
            .spawn(move || receive_loop(loop_shared))
            .expect("failed to spawn receive-loop thread");

        Session {
            shared,
            recv_thread: Some(recv_thread),
            pool,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.shared.base.details.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state() == CONNECTED
    }

    fn next_id(&self) -> u64 {
        self.shared.ids.next()
    }

    fn send(&self, message: &Message) -> Result<(), Error> {
        self.shared.base.send_message(message)
    }

    fn wait<T>(&self, rx: std::sync::mpsc::Receiver<Result<T, Error>>) -> Result<T, Error> {
        match rx.recv_timeout(self.shared.timeout) {
            Ok(result) => result,
            Err(_) => Err(Error::new(ErrorKind::Timeout)),
        }
    }

    pub fn call(&self, procedure: impl Into<String>) -> CallRequest<'_> {
        CallRequest {
            session: self,
            procedure: procedure.into(),
            args: List::new(),
            kwargs: Dict::new(),
            options: Dict::new(),
        }
    }

    pub fn register(&self, procedure: impl Into<String>, handler: ProcedureHandler) -> RegisterRequest<'_> {
        RegisterRequest {
            session: self,
            procedure: procedure.into(),
            handler,
            options: Dict::new(),
        }
    }

    pub fn publish(&self, topic: impl Into<String>) -> PublishRequest<'_> {
        PublishRequest {
            session: self,
            topic: topic.into(),
            args: List::new(),
            kwargs: Dict::new(),
            options: Dict::new(),
            acknowledge: false,
        }
    }

    pub fn subscribe(&self, topic: impl Into<String>, handler: EventHandler) -> SubscribeRequest<'_> {
        SubscribeRequest {
            session: self,
            topic: topic.into(),
            handler,
            options: Dict::new(),
        }
    }

    pub fn unregister(&self, registration_id: u64) -> Result<(), Error> {
        self.shared.ensure_connected()?;
        let request_id = self.next_id();
        let (tx, rx) = mpsc::channel();
        self.shared
            .pending
            .unregister
            .lock()
            .unwrap()
            .insert(request_id, (tx, registration_id));

        if let Err(e) = self.send(&Message::Unregister(request_id, registration_id)) {
            self.shared.pending.unregister.lock().unwrap().remove(&request_id);
            return Err(e);
        }
        self.wait(rx)
    }

    pub fn unsubscribe(&self, subscription_id: u64) -> Result<(), Error> {
        self.shared.ensure_connected()?;
        let request_id = self.next_id();
        let (tx, rx) = mpsc::channel();
        self.shared
            .pending
            .unsubscribe
            .lock()
            .unwrap()
            .insert(request_id, (tx, subscription_id));

        if let Err(e) = self.send(&Message::Unsubscribe(request_id, subscription_id)) {
            self.shared.pending.unsubscribe.lock().unwrap().remove(&request_id);
            return Err(e);
        }
        self.wait(rx)
    }

    /// Graceful leave. Only meaningful from `CONNECTED`; a second call (or a
    /// call after the peer has already closed the session) returns
    /// `InvalidState`.
    pub fn leave(&self) -> Result<(), Error> {
        // Install the promise before the CAS: otherwise a router that sends
        // an unprompted Goodbye in the window between the CAS and the
        // install would find `goodbye == None` and the receive loop would
        // silently drop it, leaving this call to wait out its timeout.
        let (tx, rx) = mpsc::channel();
        *self.shared.pending.goodbye.lock().unwrap() = Some(tx);

        if self
            .shared
            .state
            .compare_exchange(CONNECTED, LEAVING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.shared.pending.goodbye.lock().unwrap().take();
            return Err(Error::invalid_state("leave() called on a session that is not connected"));
        }

        if let Err(e) = self.send(&Message::Goodbye(Dict::new(), REASON_CLOSE_REALM.to_string())) {
            self.shared.enter_disconnected();
            return Err(e);
        }

        match rx.recv_timeout(self.shared.timeout) {
            Ok(result) => result,
            Err(_) => {
                self.shared.enter_disconnected();
                Err(Error::new(ErrorKind::Timeout))
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.enter_disconnected();
        if let Some(handle) = self.recv_thread.take() {
            let _ = handle.join();
        }
        // Wait for every in-flight Invocation/Event handler to finish
        // before tearing down the transport. `pool` lives on `Session`,
        // not `Shared`, precisely so this join always runs on the owning
        // thread rather than risking a worker joining itself.
        self.pool.join();
        let _ = self.shared.base.close();
    }
}

fn receive_loop(shared: Arc<Shared>) {
    loop {
        let message = match shared.base.recv_message() {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("transport closed by peer, disconnecting session");
                shared.enter_disconnected();
                return;
            }
            Err(e) => {
                warn!("receive loop transport error: {}", e);
                shared.enter_disconnected();
                return;
            }
        };
        trace!("received {:?}", message);

        match message {
            Message::Result(request_id, _details, args, kwargs) => {
                if let Some(promise) = shared.pending.call.lock().unwrap().remove(&request_id) {
                    let _ = promise.send(Ok(CallResult {
                        args: args.unwrap_or_default(),
                        kwargs: kwargs.unwrap_or_default(),
                    }));
                } else {
                    warn!("received Result for unknown call request {}", request_id);
                }
            }
            Message::Error(request_type, request_id, _details, uri, args, kwargs) => {
                handle_error(&shared, request_type, request_id, uri, args, kwargs);
            }
            Message::Registered(request_id, registration_id) => {
                let entry = shared.pending.register.lock().unwrap().remove(&request_id);
                match entry {
                    Some((promise, procedure, handler)) => {
                        shared.registrations.lock().unwrap().insert(registration_id, handler);
                        let _ = promise.send(Ok(Registration {
                            procedure,
                            registration_id,
                        }));
                    }
                    None => warn!("received Registered for unknown request {}", request_id),
                }
            }
            Message::Unregistered(request_id) => {
                let entry = shared.pending.unregister.lock().unwrap().remove(&request_id);
                match entry {
                    Some((promise, registration_id)) => {
                        shared.registrations.lock().unwrap().remove(&registration_id);
                        let _ = promise.send(Ok(()));
                    }
                    None => warn!("received Unregistered for unknown request {}", request_id),
                }
            }
            Message::Invocation(request_id, registration_id, _details, args, kwargs) => {
                dispatch_invocation(&shared, request_id, registration_id, args, kwargs);
            }
            Message::Subscribed(request_id, subscription_id) => {
                let entry = shared.pending.subscribe.lock().unwrap().remove(&request_id);
                match entry {
                    Some((promise, topic, handler)) => {
                        shared.subscriptions.lock().unwrap().insert(subscription_id, handler);
                        let _ = promise.send(Ok(Subscription {
                            topic,
                            subscription_id,
                        }));
                    }
                    None => warn!("received Subscribed for unknown request {}", request_id),
                }
            }
            Message::Unsubscribed(request_id) => {
                let entry = shared.pending.unsubscribe.lock().unwrap().remove(&request_id);
                match entry {
                    Some((promise, subscription_id)) => {
                        shared.subscriptions.lock().unwrap().remove(&subscription_id);
                        let _ = promise.send(Ok(()));
                    }
                    None => warn!("received Unsubscribed for unknown request {}", request_id),
                }
            }
            Message::Published(request_id, publication_id) => {
                if let Some(promise) = shared.pending.publish.lock().unwrap().remove(&request_id) {
                    let _ = promise.send(Ok(publication_id));
                }
                // absent entry is normal: unacknowledged publishes never enter the table.
            }
            Message::Event(subscription_id, _publication_id, _details, args, kwargs) => {
                dispatch_event(&shared, subscription_id, args, kwargs);
            }
            Message::Goodbye(_details, reason) => {
                if shared.state() == LEAVING {
                    if let Some(promise) = shared.pending.goodbye.lock().unwrap().take() {
                        let _ = promise.send(Ok(()));
                    }
                } else {
                    debug!("router said goodbye: {}", reason);
                    let _ = shared.base.send_message(&Message::Goodbye(
                        Dict::new(),
                        REASON_GOODBYE_AND_OUT.to_string(),
                    ));
                }
                shared.enter_disconnected();
                return;
            }
            Message::Abort(_details, reason) => {
                warn!("router aborted the session: {}", reason);
                shared.enter_disconnected();
                return;
            }
            other => warn!("received unexpected message on established session: {:?}", other),
        }
    }
}

fn handle_error(
    shared: &Shared,
    request_type: u64,
    request_id: u64,
    uri: String,
    args: Option<List>,
    kwargs: Option<Dict>,
) {
    let args = args.unwrap_or_default();
    let kwargs = kwargs.unwrap_or_default();
    let error = || Error::application(uri.clone(), args.clone(), kwargs.clone());

    let resolved = match request_type {
        message::CALL => shared
            .pending
            .call
            .lock()
            .unwrap()
            .remove(&request_id)
            .map(|p| p.send(Err(error())).is_ok()),
        message::REGISTER => shared
            .pending
            .register
            .lock()
            .unwrap()
            .remove(&request_id)
            .map(|(p, _, _)| p.send(Err(error())).is_ok()),
        message::UNREGISTER => shared
            .pending
            .unregister
            .lock()
            .unwrap()
            .remove(&request_id)
            .map(|(p, _)| p.send(Err(error())).is_ok()),
        message::PUBLISH => shared
            .pending
            .publish
            .lock()
            .unwrap()
            .remove(&request_id)
            .map(|p| p.send(Err(error())).is_ok()),
        message::SUBSCRIBE => shared
            .pending
            .subscribe
            .lock()
            .unwrap()
            .remove(&request_id)
            .map(|(p, _, _)| p.send(Err(error())).is_ok()),
        message::UNSUBSCRIBE => shared
            .pending
            .unsubscribe
            .lock()
            .unwrap()
            .remove(&request_id)
            .map(|(p, _)| p.send(Err(error())).is_ok()),
        _ => {
            warn!("received Error for unhandled request type {}", request_type);
            return;
        }
    };

    if resolved.is_none() {
        warn!(
            "received Error for unknown {} request {}",
            request_type, request_id
        );
    }
}

fn dispatch_invocation(
    shared: &Arc<Shared>,
    request_id: u64,
    registration_id: u64,
    args: Option<List>,
    kwargs: Option<Dict>,
) {
    let handler = match shared.registrations.lock().unwrap().get(&registration_id) {
        Some(handler) => Arc::clone(handler),
        None => {
            warn!("received Invocation for unknown registration {}", registration_id);
            return;
        }
    };

    let reply_shared = Arc::clone(shared);
    let _ = shared.jobs.send(Box::new(move || {
        let args = args.unwrap_or_default();
        let kwargs = kwargs.unwrap_or_default();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(args, kwargs)));

        let reply = match outcome {
            Ok(Invoke::Result(args, kwargs)) => {
                Message::Yield(request_id, Dict::new(), Some(args), Some(kwargs))
            }
            Ok(Invoke::Error(uri, args, kwargs)) => {
                Message::Error(message::INVOCATION, request_id, Dict::new(), uri, Some(args), Some(kwargs))
            }
            Err(_) => Message::Error(
                message::INVOCATION,
                request_id,
                Dict::new(),
                URI_RUNTIME_ERROR.to_string(),
                Some(List::new()),
                Some(Dict::new()),
            ),
        };
        let _ = reply_shared.base.send_message(&reply);
    }));
}

fn dispatch_event(shared: &Arc<Shared>, subscription_id: u64, args: Option<List>, kwargs: Option<Dict>) {
    let handler = match shared.subscriptions.lock().unwrap().get(&subscription_id) {
        Some(handler) => Arc::clone(handler),
        None => {
            warn!("received Event for unknown subscription {}", subscription_id);
            return;
        }
    };

    let _ = shared.jobs.send(Box::new(move || {
        let args = args.unwrap_or_default();
        let kwargs = kwargs.unwrap_or_default();
        if panic::catch_unwind(AssertUnwindSafe(|| handler(args, kwargs))).is_err() {
            warn!("event handler for subscription {} panicked", subscription_id);
        }
    }));
}

/// Fluent accumulator for `Session::call`.
pub struct CallRequest<'a> {
    session: &'a Session,
    procedure: String,
    args: List,
    kwargs: Dict,
    options: Dict,
}

impl<'a> CallRequest<'a> {
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn send(self) -> Result<CallResult, Error> {
        self.session.shared.ensure_connected()?;
        let request_id = self.session.next_id();
        let (tx, rx) = mpsc::channel();
        self.session.shared.pending.call.lock().unwrap().insert(request_id, tx);

        let args = if self.args.is_empty() { None } else { Some(self.args) };
        let kwargs = if self.kwargs.is_empty() { None } else { Some(self.kwargs) };
        let message = Message::Call(request_id, self.options, self.procedure, args, kwargs);

        if let Err(e) = self.session.send(&message) {
            self.session.shared.pending.call.lock().unwrap().remove(&request_id);
            return Err(e);
        }
        self.session.wait(rx)
    }
}

/// Fluent accumulator for `Session::register`.
pub struct RegisterRequest<'a> {
    session: &'a Session,
    procedure: String,
    handler: ProcedureHandler,
    options: Dict,
}

impl<'a> RegisterRequest<'a> {
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn send(self) -> Result<Registration, Error> {
        self.session.shared.ensure_connected()?;
        let request_id = self.session.next_id();
        let (tx, rx) = mpsc::channel();
        self.session
            .shared
            .pending
            .register
            .lock()
            .unwrap()
            .insert(request_id, (tx, self.procedure.clone(), self.handler));

        let message = Message::Register(request_id, self.options, self.procedure);
        if let Err(e) = self.session.send(&message) {
            self.session.shared.pending.register.lock().unwrap().remove(&request_id);
            return Err(e);
        }
        self.session.wait(rx)
    }
}

/// Fluent accumulator for `Session::publish`.
pub struct PublishRequest<'a> {
    session: &'a Session,
    topic: String,
    args: List,
    kwargs: Dict,
    options: Dict,
    acknowledge: bool,
}

impl<'a> PublishRequest<'a> {
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn acknowledge(mut self, acknowledge: bool) -> Self {
        self.acknowledge = acknowledge;
        self
    }

    /// With `acknowledge(false)` (the default) this returns as soon as the
    /// message is flushed; no pending entry is installed since the router
    /// never replies to an unacknowledged publish.
    pub fn send(self) -> Result<Option<u64>, Error> {
        self.session.shared.ensure_connected()?;
        let request_id = self.session.next_id();

        let mut options = self.options;
        if self.acknowledge {
            options.insert("acknowledge".to_string(), Value::Bool(true));
        }
        let args = if self.args.is_empty() { None } else { Some(self.args) };
        let kwargs = if self.kwargs.is_empty() { None } else { Some(self.kwargs) };
        let message = Message::Publish(request_id, options, self.topic, args, kwargs);

        if !self.acknowledge {
            self.session.send(&message)?;
            return Ok(None);
        }

        let (tx, rx) = mpsc::channel();
        self.session.shared.pending.publish.lock().unwrap().insert(request_id, tx);
        if let Err(e) = self.session.send(&message) {
            self.session.shared.pending.publish.lock().unwrap().remove(&request_id);
            return Err(e);
        }
        self.session.wait(rx).map(Some)
    }
}

/// Fluent accumulator for `Session::subscribe`.
pub struct SubscribeRequest<'a> {
    session: &'a Session,
    topic: String,
    handler: EventHandler,
    options: Dict,
}

impl<'a> SubscribeRequest<'a> {
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn send(self) -> Result<Subscription, Error> {
        self.session.shared.ensure_connected()?;
        let request_id = self.session.next_id();
        let (tx, rx) = mpsc::channel();
        self.session
            .shared
            .pending
            .subscribe
            .lock()
            .unwrap()
            .insert(request_id, (tx, self.topic.clone(), self.handler));

        let message = Message::Subscribe(request_id, self.options, self.topic);
        if let Err(e) = self.session.send(&message) {
            self.session.shared.pending.subscribe.lock().unwrap().remove(&request_id);
            return Err(e);
        }
        self.session.wait(rx)
    }
}
