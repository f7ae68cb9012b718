use std::process::Child;
use tracing::{debug, error};

/// Kill `child` and reap it so it does not linger as a zombie.
pub fn stop_child(child: &mut Child, name: &str) {
    if let Err(e) = child.kill() {
        error!("Failed to stop {name} process {e:?}");
    }

    match child.wait() {
        Ok(status) => debug!("{name} process exited: {status}"),
        Err(e) => error!("Failed to reap {name} process {e:?}"),
    }
}
