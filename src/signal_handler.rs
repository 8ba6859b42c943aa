use std::future::Future;

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::{Receiver, Sender};

async fn signal_handler_safe(publisher: Sender<()>) -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;

    let received = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
        _ = quit.recv() => "SIGQUIT",
    };
    log::info!("Received {}, stopping", received);
    publisher.send(())?;

    Ok(())
}

/// Publishes once on `publisher` when the process is asked to stop.
pub async fn signal_handler(publisher: Sender<()>) {
    if let Err(x) = signal_handler_safe(publisher).await {
        log::error!("Error during signal handling {}", x);
    }
}

pub fn get_signal_channel() -> (Sender<()>, Receiver<()>) {
    tokio::sync::broadcast::channel::<()>(10)
}

/// Runs `sleep` unless a signal arrives first, in which case it reports
/// `false`. A closed channel (the handler gave up) lets the sleep finish.
pub async fn sleep_unless_signalled<F>(sleep: F, signal_receiver: &mut Receiver<()>) -> bool
where
    F: Future<Output = bool>,
{
    tokio::select! {
        completed = sleep => completed,
        Ok(()) = signal_receiver.recv() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn channel_delivers_to_every_subscriber() {
        let (publisher, mut first) = get_signal_channel();
        let mut second = publisher.subscribe();

        publisher.send(()).unwrap();
        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn signal_interrupts_sleep() {
        let (publisher, mut signals) = get_signal_channel();
        publisher.send(()).unwrap();

        let sleep = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            true
        };
        assert!(!sleep_unless_signalled(sleep, &mut signals).await);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_signal_handler_does_not_cut_sleep_short() {
        let (publisher, mut signals) = get_signal_channel();
        drop(publisher);
        let start = tokio::time::Instant::now();

        let sleep = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            true
        };
        assert!(sleep_unless_signalled(sleep, &mut signals).await);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
