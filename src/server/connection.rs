// Connection handling module
// Accepts a single TCP connection and serves it with HTTP/1.1

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept a connection, enforcing the connection limit, and serve it on its own task.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state, owns the active connection counter
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    // Increment first, then check the limit, so concurrent accepts cannot both slip under it
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_connection_rejected(&peer_addr, prev_count, max_conn);
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    tokio::spawn(serve_connection(stream, peer_addr, Arc::clone(state)));
}

/// Serve one connection until it closes, errors, or times out.
///
/// While a request is in flight the connection is bounded by the request
/// timeout; between requests it is closed once idle for the keep-alive timeout.
/// Response write failures surface here as connection errors and are only logged.
async fn serve_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    let io = TokioIo::new(stream);
    let performance = &state.config.performance;
    let idle_timeout = performance.idle_timeout();
    let request_timeout = performance.request_timeout();

    let mut builder = http1::Builder::new();
    builder.keep_alive(performance.keep_alive_timeout > 0);

    let activity = Arc::new(Activity::new());
    let service_activity = Arc::clone(&activity);
    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| {
            let in_flight = service_activity.begin();
            let state = Arc::clone(&service_state);
            async move {
                let response = handler::handle_request(req, peer_addr, state).await;
                drop(in_flight);
                response
            }
        }),
    );
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(err) = result {
                logger::log_connection_error(&peer_addr, &err);
            }
        }
        expiry = watch_activity(&activity, idle_timeout, request_timeout) => match expiry {
            Expiry::Idle => logger::log_connection_idle(&peer_addr, idle_timeout.as_secs()),
            Expiry::Request => logger::log_connection_timeout(&peer_addr, request_timeout.as_secs()),
        },
    }

    state.active_connections.fetch_sub(1, Ordering::SeqCst);
}

/// Which limit closed the connection
enum Expiry {
    Idle,
    Request,
}

/// Request activity on one connection
struct Activity {
    state: Mutex<ActivityState>,
    changed: Notify,
}

struct ActivityState {
    in_flight: usize,
    /// Start of the current busy or idle period
    since: Instant,
}

/// Marks a request in flight until dropped
struct InFlight(Arc<Activity>);

impl Activity {
    fn new() -> Self {
        Self {
            state: Mutex::new(ActivityState {
                in_flight: 0,
                since: Instant::now(),
            }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActivityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        let mut state = self.lock();
        if state.in_flight == 0 {
            state.since = Instant::now();
        }
        state.in_flight += 1;
        drop(state);
        self.changed.notify_one();
        InFlight(Arc::clone(self))
    }

    /// Deadline of the current period and whether a request is in flight
    fn deadline(&self, idle: Duration, request: Duration) -> (Instant, bool) {
        let state = self.lock();
        if state.in_flight > 0 {
            (state.since + request, true)
        } else {
            (state.since + idle, false)
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            state.since = Instant::now();
        }
        drop(state);
        self.0.changed.notify_one();
    }
}

/// Resolves once the connection has been idle, or busy with one request,
/// for longer than allowed
async fn watch_activity(activity: &Activity, idle: Duration, request: Duration) -> Expiry {
    loop {
        let (deadline, busy) = activity.deadline(idle, request);
        if Instant::now() >= deadline {
            return if busy { Expiry::Request } else { Expiry::Idle };
        }
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {}
            () = activity.changed.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_connection_expires() {
        let activity = Activity::new();
        let started = Instant::now();
        let expiry =
            watch_activity(&activity, Duration::from_secs(5), Duration::from_secs(30)).await;
        assert!(matches!(expiry, Expiry::Idle));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_in_flight_uses_request_timeout() {
        let activity = Arc::new(Activity::new());
        let in_flight = activity.begin();
        let started = Instant::now();
        let expiry =
            watch_activity(&activity, Duration::from_secs(5), Duration::from_secs(30)).await;
        assert!(matches!(expiry, Expiry::Request));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        drop(in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_request_restarts_idle_period() {
        let activity = Arc::new(Activity::new());
        let started = Instant::now();

        let in_flight = activity.begin();
        let release = async {
            tokio::time::sleep(Duration::from_secs(8)).await;
            drop(in_flight);
            std::future::pending::<()>().await;
        };

        let expiry = tokio::select! {
            expiry = watch_activity(&activity, Duration::from_secs(5), Duration::from_secs(30)) => expiry,
            () = release => unreachable!(),
        };
        assert!(matches!(expiry, Expiry::Idle));
        assert_eq!(started.elapsed(), Duration::from_secs(13));
    }
}
