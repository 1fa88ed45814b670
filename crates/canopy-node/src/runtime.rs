//! Node runtime: the receive loop around one exploration state machine.
//!
//! # Lifecycle
//!
//! ```text
//! root:      sleep(start_delay) → start() ─┐
//!                                          ↓
//! all:   ┌──> accept → read frame → handle_message → execute actions
//!        └──────────────────────────────────┘  until Terminate
//!                                          ↓
//!                       close lanes, await flush → TreeReport
//! ```
//!
//! # Sending
//!
//! Sends never block the receive loop. Each destination gets an outbound
//! lane: a task fed by an unbounded channel that opens one connection per
//! message, writes the frame and closes it, strictly in the order messages
//! were queued. Because a new connection is only opened after the previous
//! one is established, a neighbour receives this node's messages in order.
//!
//! A lane that fails to deliver ends the node with [`NodeError::Send`]; the
//! receive loop observes lane completion through a [`JoinSet`].

use std::{collections::HashMap, sync::Arc, time::Duration};

use canopy_core::{
    Explorer, ExplorerAction, NodeAddr, NodeIdentity, SelectionPolicy, TreeReport,
    env::Environment, transport::Transport,
};
use canopy_proto::{Frame, Message};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::mpsc,
    task::JoinSet,
};
use tracing::{debug, info};

use crate::error::NodeError;

/// Drives one node from startup to termination.
pub struct NodeRuntime<T, E, P> {
    explorer: Explorer,
    transport: Arc<T>,
    env: E,
    policy: P,
    start_delay: Duration,
}

impl<T, E, P> NodeRuntime<T, E, P>
where
    T: Transport,
    E: Environment,
    P: SelectionPolicy,
{
    /// Create a runtime for `identity`, bound to `transport`.
    pub fn new(identity: NodeIdentity, is_root: bool, transport: T, env: E, policy: P) -> Self {
        Self {
            explorer: Explorer::new(identity, is_root),
            transport: Arc::new(transport),
            env,
            policy,
            start_delay: Duration::ZERO,
        }
    }

    /// Delay before the root sends its first probe, giving other nodes time
    /// to start listening. Ignored on non-root nodes.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Run the receive loop until the node terminates.
    ///
    /// # Errors
    ///
    /// Any transport failure, malformed frame or protocol violation aborts the
    /// node; see [`NodeError`].
    pub async fn run(mut self) -> Result<TreeReport, NodeError> {
        let node = self.explorer.addr();
        let mut lanes = Lanes::new(Arc::clone(&self.transport));

        info!(
            node = %node,
            root = self.explorer.is_root(),
            neighbours = self.explorer.identity().neighbours.len(),
            "Node started"
        );

        let mut terminated = false;
        if self.explorer.is_root() {
            self.env.sleep(self.start_delay).await;
            let actions = self.explorer.start(&mut self.policy)?;
            terminated = execute(node, actions, &mut lanes);
        }

        while !terminated {
            let event = tokio::select! {
                accepted = self.transport.accept() => {
                    Event::Inbound(accepted.map_err(NodeError::Accept)?)
                },
                Some(joined) = lanes.join_next(), if !lanes.is_empty() => {
                    Event::LaneClosed(joined?)
                },
            };

            match event {
                Event::Inbound((from, mut stream)) => {
                    let message = read_message(from, &mut stream).await?;
                    debug!(node = %node, from = %from, message = %message, "Message received");

                    let actions = self.explorer.handle_message(from, message, &mut self.policy)?;
                    terminated = execute(node, actions, &mut lanes);
                },
                Event::LaneClosed(result) => result?,
            }
        }

        lanes.close().await?;

        let report = self.explorer.report().ok_or_else(|| {
            canopy_core::ExplorationError::InvariantViolated(
                "terminated without a report".to_string(),
            )
        })?;

        if report.is_root {
            info!(
                node = %node,
                children = report.children.len(),
                "Root has no more neighbours to explore, traversal complete"
            );
        } else {
            info!(
                node = %node,
                parent = ?report.parent,
                children = ?report.children,
                rejected = ?report.rejected,
                "No more neighbours to explore and parent notified, terminating"
            );
        }

        Ok(report)
    }
}

enum Event<S> {
    Inbound((NodeAddr, S)),
    LaneClosed(Result<(), NodeError>),
}

/// Queue the actions' sends; returns true once the node terminated.
fn execute<T: Transport>(
    node: NodeAddr,
    actions: Vec<ExplorerAction>,
    lanes: &mut Lanes<T>,
) -> bool {
    let mut terminated = false;

    for action in actions {
        match action {
            ExplorerAction::Send { to, message } => {
                debug!(node = %node, to = %to, message = %message, "Queueing message");
                lanes.send(to, message);
            },
            ExplorerAction::Terminate => terminated = true,
        }
    }

    terminated
}

async fn read_message<S>(from: NodeAddr, stream: &mut S) -> Result<Message, NodeError>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut buf = [0u8; Frame::SIZE];
    stream.read_exact(&mut buf).await.map_err(|source| NodeError::Receive { from, source })?;

    Ok(Frame::decode(&buf)?.message)
}

/// Per-destination outbound queues.
struct Lanes<T> {
    transport: Arc<T>,
    queues: HashMap<NodeAddr, mpsc::UnboundedSender<Message>>,
    tasks: JoinSet<Result<(), NodeError>>,
}

impl<T: Transport> Lanes<T> {
    fn new(transport: Arc<T>) -> Self {
        Self { transport, queues: HashMap::new(), tasks: JoinSet::new() }
    }

    fn send(&mut self, to: NodeAddr, message: Message) {
        let queue = self.queues.entry(to).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            self.tasks.spawn(deliver(Arc::clone(&self.transport), to, rx));
            tx
        });

        // A closed queue means the lane already failed; its error reaches
        // the receive loop through `join_next`
        let _ = queue.send(message);
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    async fn join_next(&mut self) -> Option<Result<Result<(), NodeError>, tokio::task::JoinError>> {
        self.tasks.join_next().await
    }

    /// Close every queue and wait until all queued messages are delivered.
    async fn close(mut self) -> Result<(), NodeError> {
        self.queues.clear();

        while let Some(joined) = self.tasks.join_next().await {
            joined??;
        }

        Ok(())
    }
}

async fn deliver<T: Transport>(
    transport: Arc<T>,
    to: NodeAddr,
    mut queue: mpsc::UnboundedReceiver<Message>,
) -> Result<(), NodeError> {
    let from = transport.local_addr();

    let mut buf = Vec::with_capacity(Frame::SIZE);

    while let Some(message) = queue.recv().await {
        let send_err = |source| NodeError::Send { to, source };

        buf.clear();
        Frame::from(message).encode(&mut buf);

        let mut stream = transport.connect(to).await.map_err(send_err)?;
        stream.write_all(&buf).await.map_err(send_err)?;
        stream.shutdown().await.map_err(send_err)?;

        debug!(node = %from, to = %to, message = %message, "Message sent");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, io, sync::Mutex};

    use async_trait::async_trait;
    use canopy_core::LightestEdge;
    use tokio::io::{DuplexStream, duplex};

    use super::*;

    fn addr(last: u8) -> NodeAddr {
        NodeAddr::v4(10, 0, 0, last)
    }

    #[derive(Clone, Copy)]
    struct NoDelay;

    impl Environment for NoDelay {
        async fn sleep(&self, _duration: Duration) {}

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0);
        }
    }

    /// Scripted transport: a fixed inbox and a log of delivered frames.
    struct Scripted {
        local: NodeAddr,
        inbox: Mutex<VecDeque<(NodeAddr, Message)>>,
        sent: Arc<Mutex<Vec<(NodeAddr, Vec<u8>)>>>,
        refuse: Option<NodeAddr>,
    }

    #[async_trait]
    impl Transport for Scripted {
        type SendStream = DuplexStream;
        type RecvStream = DuplexStream;

        fn local_addr(&self) -> NodeAddr {
            self.local
        }

        async fn accept(&self) -> io::Result<(NodeAddr, DuplexStream)> {
            let next = self.inbox.lock().unwrap().pop_front();
            let Some((from, message)) = next else {
                return std::future::pending().await;
            };
            let (mut client, server) = duplex(16);
            client.write_all(&Frame::new(message).to_bytes()).await?;
            Ok((from, server))
        }

        async fn connect(&self, to: NodeAddr) -> io::Result<DuplexStream> {
            if self.refuse == Some(to) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            let (client, mut server) = duplex(16);
            let sent = Arc::clone(&self.sent);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if server.read_to_end(&mut buf).await.is_ok() {
                    sent.lock().unwrap().push((to, buf));
                }
            });
            Ok(client)
        }
    }

    fn scripted(local: u8, inbox: &[(u8, Message)], refuse: Option<u8>) -> Scripted {
        Scripted {
            local: addr(local),
            inbox: Mutex::new(inbox.iter().map(|(from, m)| (addr(*from), *m)).collect()),
            sent: Arc::new(Mutex::new(Vec::new())),
            refuse: refuse.map(addr),
        }
    }

    #[tokio::test]
    async fn leaf_reports_parent_and_flushes_accept() {
        let transport = scripted(2, &[(1, Message::Probe)], None);
        let sent = Arc::clone(&transport.sent);
        let identity = NodeIdentity::unweighted(addr(2), [addr(1)]).unwrap();

        let runtime = NodeRuntime::new(identity, false, transport, NoDelay, LightestEdge);
        let report = runtime.run().await.unwrap();

        assert_eq!(report.parent, Some(addr(1)));
        assert!(report.children.is_empty());

        // Lanes are flushed before run() returns; give the reader task a turn
        for _ in 0..100 {
            if !sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let sent = sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(addr(1), Frame::new(Message::Accept).to_bytes().to_vec())]);
    }

    #[tokio::test]
    async fn root_collects_children() {
        let transport = scripted(1, &[(2, Message::Accept), (3, Message::Reject)], None);
        let identity = NodeIdentity::unweighted(addr(1), [addr(2), addr(3)]).unwrap();

        let report =
            NodeRuntime::new(identity, true, transport, NoDelay, LightestEdge).run().await.unwrap();

        assert!(report.is_root);
        assert_eq!(report.children.iter().copied().collect::<Vec<_>>(), vec![addr(2)]);
        assert_eq!(report.rejected.iter().copied().collect::<Vec<_>>(), vec![addr(3)]);
    }

    #[tokio::test]
    async fn isolated_root_terminates_without_traffic() {
        let transport = scripted(1, &[], None);
        let identity = NodeIdentity::unweighted(addr(1), []).unwrap();

        let report =
            NodeRuntime::new(identity, true, transport, NoDelay, LightestEdge).run().await.unwrap();

        assert!(report.children.is_empty() && report.rejected.is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_fatal() {
        let transport = scripted(1, &[], Some(2));
        let identity = NodeIdentity::unweighted(addr(1), [addr(2)]).unwrap();

        let err = NodeRuntime::new(identity, true, transport, NoDelay, LightestEdge)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, NodeError::Send { to, .. } if to == addr(2)));
    }

    #[tokio::test]
    async fn protocol_violation_is_fatal() {
        let transport = scripted(2, &[(7, Message::Probe)], None);
        let identity = NodeIdentity::unweighted(addr(2), [addr(1)]).unwrap();

        let err = NodeRuntime::new(identity, false, transport, NoDelay, LightestEdge)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, NodeError::Exploration(_)));
    }
}
