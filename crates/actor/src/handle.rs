use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::mailbox::{Mailbox, MailboxParts};
use crate::scheduler::run_actor;
use crate::task::TaskHandle;
use crate::{ActorDeadError, Message};

/// Handle to an actor.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: Send + 'static> Actor<S> {
    /// Spawns a new actor with the specified state and an optional label.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let MailboxParts {
            mailbox,
            msg_rx,
            kill_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(Arc::downgrade(&mailbox), state, msg_rx, kill_rx)
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    #[inline]
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<S>>) -> Self {
        Self { mailbox }
    }

    /// Sends a message to the actor.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), ActorDeadError> {
        self.mailbox.send(Box::new(msg))
    }

    /// Delivers `msg` to the actor after `delay`.
    ///
    /// The message is discarded if the returned handle is aborted or
    /// dropped before the delay elapses, which makes it suitable for
    /// resettable timers: store the handle in the state and replace it.
    pub fn send_after<M: Message<S> + 'static>(
        &self,
        delay: Duration,
        msg: M,
    ) -> TaskHandle {
        let handle = self.clone();
        self.spawn_task(async move {
            tokio::time::sleep(delay).await;
            handle.send(msg).ok();
        })
    }

    /// Spawns a task working on behalf of the actor.
    ///
    /// The task runs in the actor's tracing span and is aborted when the
    /// returned handle is dropped.
    pub fn spawn_task<F>(&self, fut: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join_handle =
            tokio::spawn(fut.instrument(tracing::Span::current()));
        TaskHandle::new(join_handle)
    }

    /// Attempts to kill the actor.
    ///
    /// The actor is not guaranteed to be killed immediately, but it
    /// will stop handling further messages and quit soon.
    #[inline]
    pub fn try_kill(&self) {
        self.mailbox.try_kill();
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}
