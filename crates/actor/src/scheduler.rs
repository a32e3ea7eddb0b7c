use std::sync::Weak;

use tokio::select;
use tokio::sync::watch;

use crate::{Actor, Message};
use crate::mailbox::{Mailbox, MessageReceiver};

pub(crate) async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: MessageReceiver<S>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.wait_for(|killed| *killed) => {
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last mailbox has been dropped, discard the message");
            break;
        };
        trace_span!("proc msg").in_scope(|| {
            msg.handle(&mut state, &Actor::from_mailbox(mailbox));
        });
    }
    // Dropping the state here also drops every `TaskHandle` it owns, which
    // aborts the tasks and timers started on its behalf.
    drop(state);
    debug!("terminated");
}
