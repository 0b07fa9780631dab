//! Request/response channels used to talk to actors running in Tokio tasks.

use std::{fmt::Debug, result::Result};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

/// How many requests may queue up for an actor before senders start waiting.
const REQUEST_QUEUE_LENGTH: usize = 8;

type ResponseReceiver<R, E> = oneshot::Receiver<Result<R, E>>;

/// A single request for an actor, carrying the channel its answer goes back on.
pub struct Request<P, R, E> {
    pub payload: P,
    pub response_sender: oneshot::Sender<Result<R, E>>,
}

impl<P, R, E> Request<P, R, E> {
    /// Wraps the payload into a [Request] and returns the receiver on which
    /// the response will arrive.
    pub fn new(payload: P) -> (Request<P, R, E>, ResponseReceiver<R, E>) {
        let (response_sender, response_receiver) = oneshot::channel();
        let request = Request {
            payload,
            response_sender,
        };
        (request, response_receiver)
    }

    /// Answers the request. Fails with the response if the requester has
    /// already given up waiting.
    pub fn respond(self, response: Result<R, E>) -> Result<(), Result<R, E>> {
        self.response_sender.send(response)
    }
}

/// An error occuring during the exchange of messages with an actor.
#[derive(Debug, Error, Clone)]
pub enum ActorRequestError<E: Debug> {
    #[error("error when sending message to actor")]
    Send,

    #[error("error while awating request response channel")]
    Recv,

    #[error("internal actor error: {0:?}")]
    Actor(E),
}

/// The sending side of an actor's mailbox.
///
/// Ports are cheap to clone and every clone keeps the actor alive. The actor
/// sees its mailbox close once the last port is dropped (or has had
/// [ActorPort::await_shutdown] called on it) and is expected to clean up and
/// stop at that point instead of waiting for an explicit stop message.
#[derive(Debug)]
pub struct ActorPort<P, R, E: Debug> {
    message_sender: mpsc::Sender<Request<P, R, E>>,
    shutdown_receiver: watch::Receiver<()>,
}

// Deriving Clone would require P, R and E to be Clone as well.
impl<P, R, E: Debug> Clone for ActorPort<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            message_sender: self.message_sender.clone(),
            shutdown_receiver: self.shutdown_receiver.clone(),
        }
    }
}

impl<P, R, E: Debug> ActorPort<P, R, E> {
    /// Creates a connected port and receiver. The receiver belongs inside the
    /// actor's task, the port goes to whoever wants to talk to it.
    pub fn make() -> (ActorPort<P, R, E>, ActorReceiver<P, R, E>) {
        let (request_sender, request_receiver) = mpsc::channel(REQUEST_QUEUE_LENGTH);
        let (shutdown_sender, shutdown_receiver) = watch::channel(());
        (
            ActorPort {
                message_sender: request_sender,
                shutdown_receiver,
            },
            ActorReceiver {
                request_receiver,
                _shutdown_notifier: shutdown_sender,
            },
        )
    }

    /// Sends the payload to the actor and waits for its answer.
    pub async fn request(&self, payload: P) -> Result<R, ActorRequestError<E>> {
        let (req, rx) = Request::new(payload);
        if self.message_sender.send(req).await.is_err() {
            return Err(ActorRequestError::Send);
        }
        match rx.await {
            Err(_) => Err(ActorRequestError::Recv),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(actor_error)) => Err(ActorRequestError::Actor(actor_error)),
        }
    }

    /// Await actor termination
    ///
    /// Gives up this port and waits until every other clone is gone and the
    /// actor has dropped its [ActorReceiver].
    pub async fn await_shutdown(self) {
        // Closing our sender is part of the shutdown signal the actor waits for.
        drop(self.message_sender);
        let mut shutdown_receiver = self.shutdown_receiver;
        let result = shutdown_receiver.changed().await;
        assert!(result.is_err());
    }
}

/// The receiving side of an [ActorPort].
///
/// Dropping it tells waiting [ActorPort::await_shutdown] calls that the actor
/// is done, so it must be the last thing an actor drops.
#[derive(Debug)]
pub struct ActorReceiver<P, R, E: Debug> {
    pub request_receiver: mpsc::Receiver<Request<P, R, E>>,
    _shutdown_notifier: watch::Sender<()>,
}

impl<P, R, E: Debug> ActorReceiver<P, R, E> {
    /// Receives the next request, `None` once all ports are gone.
    pub async fn recv(&mut self) -> Option<Request<P, R, E>> {
        self.request_receiver.recv().await
    }
}

/// A port which carries no messages, only the lifecycle of a child task.
///
/// The parent keeps the [Handle], the task keeps the [HandleChild]. Dropping
/// the handle, or calling [Handle::await_shutdown], asks the child to stop.
pub struct Handle(ActorPort<(), (), ()>);

impl Handle {
    pub fn new() -> (Handle, HandleChild) {
        let (port, receiver) = ActorPort::make();
        (Handle(port), HandleChild(receiver))
    }

    /// Asks the child to stop and waits until it drops its [HandleChild].
    pub async fn await_shutdown(self) {
        self.0.await_shutdown().await
    }
}

/// The child's side of a [Handle].
pub struct HandleChild(ActorReceiver<(), (), ()>);

impl HandleChild {
    /// Resolves once the parent wants the child to stop. Meant to be one arm
    /// of a [tokio::select!].
    pub async fn should_terminate(&mut self) {
        let res = self.0.recv().await;
        assert!(res.is_none());
    }
}
