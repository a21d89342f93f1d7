//! Session orchestration.
//!
//! Owns both transports and the reconstructed book. Each transport fans
//! decoded payloads out through its dispatcher; forwarding tasks funnel
//! both streams into one mpsc queue, and a single apply task serializes
//! all book mutation. Readers take the book lock briefly for snapshots.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use book::RiskBook;
use codec::{decode_order_event, Command};
use network::{
    MulticastAdapter, MulticastConfig, SessionDispatcher, StreamAdapter, StreamConfig,
};
use types::{
    CapitalSnapshot, ConnectionStatus, ControlDirective, LogRecord, PositionSnapshot,
};

use crate::config::MonitorConfig;

/// Events from either transport, merged for the single book writer.
enum FeedEvent {
    Log(LogRecord),
    Position(PositionSnapshot),
    Capital(CapitalSnapshot),
    Io(Vec<u8>),
    RewindComplete,
}

/// Queue depth between the forwarders and the apply task.
const APPLY_QUEUE_DEPTH: usize = 4096;

/// One monitored risk-control session: stream + multicast in, commands
/// out, reconstructed state behind a lock.
pub struct RiskSession {
    stream: StreamAdapter,
    multicast: MulticastAdapter,
    book: Arc<RwLock<RiskBook>>,
    pump_tasks: Vec<JoinHandle<()>>,
}

impl RiskSession {
    pub fn new(config: &MonitorConfig) -> Self {
        let stream_dispatcher = Arc::new(SessionDispatcher::new());
        let multicast_dispatcher = Arc::new(SessionDispatcher::new());
        let book = Arc::new(RwLock::new(RiskBook::new()));

        let (tx, rx) = mpsc::channel(APPLY_QUEUE_DEPTH);
        let mut pump_tasks = subscribe_all(&stream_dispatcher, &tx);
        pump_tasks.extend(subscribe_all(&multicast_dispatcher, &tx));
        pump_tasks.push(tokio::spawn(apply_loop(rx, Arc::clone(&book))));

        let stream = StreamAdapter::new(
            StreamConfig {
                host: config.host.clone(),
                port: config.stream_port,
                ..StreamConfig::default()
            },
            stream_dispatcher,
        );
        let multicast = MulticastAdapter::new(
            MulticastConfig {
                group: config.multicast_group,
                port: config.multicast_port,
                ..MulticastConfig::default()
            },
            multicast_dispatcher,
        );

        Self {
            stream,
            multicast,
            book,
            pump_tasks,
        }
    }

    /// Bring both transports up. The stream connection is mandatory; the
    /// multicast join failing is reported but does not fail the session,
    /// since the stream alone carries the full feed.
    pub async fn connect(&mut self) -> network::Result<()> {
        self.stream.connect().await?;
        if let Err(e) = self.multicast.start().await {
            warn!(error = %e, "multicast feed unavailable, continuing on stream only");
        }
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        self.stream.disconnect().await;
        self.multicast.stop().await;
    }

    /// Shut the apply pipeline down with the transports. Only needed when
    /// the session ends before the process does.
    pub async fn shutdown(mut self) {
        self.disconnect().await;
        for task in self.pump_tasks.drain(..) {
            task.abort();
        }
    }

    pub fn book(&self) -> Arc<RwLock<RiskBook>> {
        Arc::clone(&self.book)
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.stream.dispatcher().subscribe_status()
    }

    /// Server log lines from the stream feed, independent of book retention.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogRecord> {
        self.stream.dispatcher().subscribe_logs()
    }

    pub fn stream_endpoint(&self) -> String {
        self.stream.endpoint()
    }

    pub async fn set_control(&self, directive: ControlDirective) -> network::Result<()> {
        self.stream.send(&Command::SetControl(directive)).await
    }

    pub async fn request_history(&self) -> network::Result<()> {
        self.stream.send(&Command::GetControlsHistory).await
    }

    pub async fn request_rewind(&self, last_seen: u32) -> network::Result<()> {
        self.stream.send(&Command::Rewind { last_seen }).await
    }

    pub async fn request_server_shutdown(&self) -> network::Result<()> {
        self.stream.send(&Command::Shutdown).await
    }

    #[cfg(test)]
    fn stream_dispatcher(&self) -> &Arc<SessionDispatcher> {
        self.stream.dispatcher()
    }
}

/// Forward every event kind of one dispatcher into the merge queue.
fn subscribe_all(
    dispatcher: &Arc<SessionDispatcher>,
    tx: &mpsc::Sender<FeedEvent>,
) -> Vec<JoinHandle<()>> {
    vec![
        pump(dispatcher.subscribe_logs(), tx.clone(), FeedEvent::Log),
        pump(
            dispatcher.subscribe_positions(),
            tx.clone(),
            FeedEvent::Position,
        ),
        pump(
            dispatcher.subscribe_capitals(),
            tx.clone(),
            FeedEvent::Capital,
        ),
        pump(dispatcher.subscribe_io_bytes(), tx.clone(), FeedEvent::Io),
        pump(dispatcher.subscribe_rewinds(), tx.clone(), |()| {
            FeedEvent::RewindComplete
        }),
    ]
}

fn pump<T, F>(
    mut rx: broadcast::Receiver<T>,
    tx: mpsc::Sender<FeedEvent>,
    wrap: F,
) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
    F: Fn(T) -> FeedEvent + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if tx.send(wrap(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    warn!(dropped, "feed subscriber lagged, events lost");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// The single book writer.
async fn apply_loop(mut rx: mpsc::Receiver<FeedEvent>, book: Arc<RwLock<RiskBook>>) {
    while let Some(event) = rx.recv().await {
        let mut book = book.write().await;
        match event {
            FeedEvent::Log(record) => book.record_log(record),
            FeedEvent::Position(snapshot) => book.apply_position(&snapshot),
            FeedEvent::Capital(snapshot) => book.apply_capital(&snapshot),
            FeedEvent::Io(bytes) => {
                let event = decode_order_event(&bytes, Utc::now());
                book.apply_order_event(event);
            }
            FeedEvent::RewindComplete => {
                info!("server finished replaying history");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::Payload;
    use std::time::Duration;
    use types::Severity;

    async fn wait_until<F>(mut condition: F)
    where
        F: FnMut() -> bool,
    {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 2s");
    }

    #[tokio::test]
    async fn feed_events_flow_into_the_book() {
        let session = RiskSession::new(&MonitorConfig::default());
        let dispatcher = Arc::clone(session.stream_dispatcher());
        let book = session.book();

        dispatcher.publish(Payload::Log(LogRecord {
            severity: Severity::Warning,
            message: "order rate near limit".to_string(),
            timestamp: Utc::now(),
        }));
        dispatcher.publish(Payload::Position(PositionSnapshot {
            instrument: "PLKGHM000017".to_string(),
            net: 100,
            open_long: 100,
            open_short: 0,
            captured_at: Utc::now(),
        }));
        dispatcher.publish(Payload::IoBytes(
            b"8=FIX.4.4|35=D|11=ORD9|55=KGH|54=1|44=37.25|38=50|".to_vec(),
        ));

        {
            let book = Arc::clone(&book);
            wait_until(move || {
                let book = book.try_read();
                matches!(&book, Ok(b) if b.logs().len() == 1 && b.positions().len() == 2 && !b.orders().is_empty())
            })
            .await;
        }

        let book = book.read().await;
        assert_eq!(book.logs().latest().unwrap().severity, Severity::Warning);
        assert!(book
            .positions()
            .iter()
            .any(|p| p.instrument == "PLKGHM000017" && p.net == 100));
        let entry = book.orders().latest().unwrap();
        assert_eq!(entry.order_id, "ORD9");
        assert_eq!(entry.ticker, "KGH");
        assert_eq!(entry.order_qty, 50);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn commands_fail_fast_while_disconnected() {
        let session = RiskSession::new(&MonitorConfig::default());
        assert!(session
            .set_control("GLOBAL,Halt,1".parse().unwrap())
            .await
            .is_err());
        assert!(session.request_rewind(0).await.is_err());
        session.shutdown().await;
    }
}
