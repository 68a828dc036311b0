use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use llmserve_server::queue::{InferenceQueue, QueueError};
use rocket::tokio;

#[rocket::async_test]
async fn rejects_work_beyond_capacity() {
    let queue = InferenceQueue::new(1);

    let _first = queue
        .enqueue_stream(|tx| async move {
            let _ = tx.send(1u32);
        })
        .expect("first job fits");
    let second = queue.enqueue_stream(|tx| async move {
        let _ = tx.send(2u32);
    });

    assert_eq!(second.err(), Some(QueueError::Full));
    assert_eq!(queue.depth(), 1);
}

#[rocket::async_test]
async fn runs_jobs_in_submission_order() {
    let queue = InferenceQueue::new(8);
    queue.start_worker();
    let order = Arc::new(Mutex::new(Vec::new()));

    let job = |index: usize| {
        let order = Arc::clone(&order);
        move || async move {
            order.lock().unwrap().push(index);
            index
        }
    };
    let (a, b, c) = tokio::join!(
        queue.enqueue(job(0)),
        queue.enqueue(job(1)),
        queue.enqueue(job(2))
    );

    assert_eq!((a, b, c), (Ok(0), Ok(1), Ok(2)));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[rocket::async_test]
async fn skips_jobs_whose_caller_went_away() {
    let queue = InferenceQueue::new(8);
    let abandoned_ran = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&abandoned_ran);
    let abandoned = queue
        .enqueue_stream(move |tx| async move {
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send("abandoned");
        })
        .expect("enqueue abandoned job");
    drop(abandoned);

    let mut kept = queue
        .enqueue_stream(|tx| async move {
            let _ = tx.send("kept");
        })
        .expect("enqueue kept job");

    queue.start_worker();
    assert_eq!(kept.recv().await, Some("kept"));
    assert!(!abandoned_ran.load(Ordering::SeqCst));
}

#[rocket::async_test]
async fn start_worker_is_idempotent() {
    let queue = InferenceQueue::new(4);
    queue.start_worker();
    queue.start_worker();

    assert_eq!(queue.enqueue(|| async { 7 }).await, Ok(7));
}

#[rocket::async_test]
async fn shutdown_rejects_new_work_and_drops_pending_jobs() {
    let queue = InferenceQueue::new(4);
    let mut pending = queue
        .enqueue_stream(|tx| async move {
            let _ = tx.send(1u8);
        })
        .expect("enqueue before shutdown");

    queue.shutdown();

    assert!(queue.is_closed());
    assert_eq!(queue.depth(), 0);
    assert_eq!(pending.recv().await, None);
    assert_eq!(queue.enqueue(|| async { 1 }).await, Err(QueueError::Closed));
}

fn explode() {
    panic!("job exploded");
}

#[rocket::async_test]
async fn a_panicking_job_does_not_stop_the_worker() {
    let queue = InferenceQueue::new(4);
    queue.start_worker();

    let panicked = queue.enqueue(|| async { explode() }).await;
    assert_eq!(panicked, Err(QueueError::Closed));

    assert_eq!(queue.enqueue(|| async { "still running" }).await, Ok("still running"));
}

#[test]
fn shutdown_racing_with_enqueue_leaves_nothing_queued() {
    for _ in 0..50 {
        let queue = InferenceQueue::new(1024);
        let producers = (0..4)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for _ in 0..64 {
                        let _ = queue.enqueue_stream(|tx| async move {
                            let _ = tx.send(());
                        });
                    }
                })
            })
            .collect::<Vec<_>>();

        queue.shutdown();
        for producer in producers {
            producer.join().expect("producer thread");
        }

        assert!(queue.is_closed());
        assert_eq!(queue.depth(), 0);
    }
}
