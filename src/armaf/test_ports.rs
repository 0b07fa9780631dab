use super::ports::{ActorPort, ActorRequestError, Handle, Request};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

#[tokio::test]
async fn test_request_response() {
    let (request, receiver): (Request<u8, u8, ()>, _) = Request::new(40);
    let payload = request.payload;
    assert_eq!(payload, 40);
    request
        .respond(Ok(payload + 2))
        .expect("Channel failure when sending response");
    let response = receiver
        .await
        .expect("Channel failure when receiving response");
    assert_eq!(response, Ok(42));
}

#[tokio::test]
async fn test_actor_port() {
    let stopped = make_flag();
    let port = spawn_dimmer(20, stopped.clone());
    assert_eq!(port.request(DimmerMessage::Dim).await.unwrap(), 10);
    assert_eq!(port.request(DimmerMessage::Dim).await.unwrap(), 0);
    match port.request(DimmerMessage::Dim).await {
        Err(ActorRequestError::Actor(e)) => assert_eq!(e, "already off"),
        other => panic!("An error from the actor is not translated correctly: {:?}", other),
    }
    assert!(!stopped.load(Ordering::Acquire));
    port.await_shutdown().await;
    assert!(stopped.load(Ordering::Acquire));
}

#[tokio::test]
async fn test_request_errors() {
    let port = spawn_dimmer(50, make_flag());
    match port.request(DimmerMessage::Vanish).await {
        Err(ActorRequestError::Recv) => {}
        other => panic!("A dropped request is not translated correctly: {:?}", other),
    }
    match port.request(DimmerMessage::Dim).await {
        Err(ActorRequestError::Send) => {}
        other => panic!("A closed mailbox is not translated correctly: {:?}", other),
    }

    // Hangs if the receiver doesn't release the shutdown notifier on drop
    port.await_shutdown().await;
}

#[tokio::test]
async fn test_clones_keep_actor_alive() {
    let stopped = make_flag();
    let port = spawn_dimmer(30, stopped.clone());
    let clone = port.clone();
    drop(port);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stopped.load(Ordering::Acquire));
    assert_eq!(clone.request(DimmerMessage::Dim).await.unwrap(), 20);
    clone.await_shutdown().await;
    assert!(stopped.load(Ordering::Acquire));
}

#[tokio::test]
async fn test_handle_drop() {
    let flag = make_flag();
    let handle = spawn_handle_tester(flag.clone());
    assert!(!flag.load(Ordering::Acquire));
    drop(handle);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(flag.load(Ordering::Acquire));
}

#[tokio::test]
async fn test_handle_await() {
    let flag = make_flag();
    let handle = spawn_handle_tester(flag.clone());
    assert!(!flag.load(Ordering::Acquire));
    handle.await_shutdown().await;
    assert!(flag.load(Ordering::Acquire));
}

#[derive(Debug)]
enum DimmerMessage {
    Dim,
    // Drops the request without answering, a real actor must never do this.
    Vanish,
}

fn spawn_dimmer(
    mut level: u8,
    stopped: Arc<AtomicBool>,
) -> ActorPort<DimmerMessage, u8, &'static str> {
    let (port, mut rx) = ActorPort::make();
    tokio::spawn(async move {
        while let Some(req) = rx.recv().await {
            match req.payload {
                DimmerMessage::Dim => {
                    let response = if level == 0 {
                        Err("already off")
                    } else {
                        level = level.saturating_sub(10);
                        Ok(level)
                    };
                    req.respond(response).expect("Couldn't respond to request");
                }
                DimmerMessage::Vanish => return,
            }
        }
        stopped.store(true, Ordering::Release);
    });
    port
}

fn spawn_handle_tester(termination_flag: Arc<AtomicBool>) -> Handle {
    let (handle, mut handle_child) = Handle::new();
    tokio::spawn(async move {
        handle_child.should_terminate().await;
        termination_flag.store(true, Ordering::Release);
    });
    handle
}

fn make_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}
