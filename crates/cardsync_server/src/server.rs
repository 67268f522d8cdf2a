//! The TCP accept loop.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::session::{log_session_end, Session};
use crate::store::CardStore;
use cardsync_protocol::{read_block, write_block, PROTOCOL_VERSION};
use parking_lot::Mutex;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The card server: a bound listener serving one thread per connection.
pub struct Server {
    config: ServerConfig,
    store: Arc<CardStore>,
    listener: TcpListener,
}

impl Server {
    /// Binds the listener and opens the card store.
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        let store = Arc::new(CardStore::open(&config.data_dir)?);
        let listener = TcpListener::bind(config.bind_addr)?;
        info!(addr = %listener.local_addr()?, dir = %config.data_dir.display(), "server bound");
        Ok(Self {
            config,
            store,
            listener,
        })
    }

    /// Returns the bound address (useful with port 0).
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the card store backing this server.
    pub fn store(&self) -> Arc<CardStore> {
        Arc::clone(&self.store)
    }

    /// Runs the accept loop on the calling thread until the process
    /// ends. Use [`Server::spawn`] for a stoppable server.
    pub fn run(self) -> ServerResult<()> {
        let running = AtomicBool::new(true);
        let active = Arc::new(AtomicUsize::new(0));
        let sessions = Mutex::new(Vec::new());
        self.accept_loop(&running, &active, &sessions);
        Ok(())
    }

    /// Starts the accept loop on a background thread and returns a
    /// handle that shuts the server down.
    pub fn spawn(self) -> ServerResult<ServerHandle> {
        let addr = self.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let active = Arc::new(AtomicUsize::new(0));
        let sessions: Arc<Mutex<Vec<TcpStream>>> = Arc::new(Mutex::new(Vec::new()));
        let drain_timeout = self.config.drain_timeout;

        let accept_running = Arc::clone(&running);
        let accept_active = Arc::clone(&active);
        let accept_sessions = Arc::clone(&sessions);
        let thread = thread::spawn(move || {
            self.accept_loop(&accept_running, &accept_active, &accept_sessions);
        });

        Ok(ServerHandle {
            addr,
            running,
            active,
            sessions,
            drain_timeout,
            thread,
        })
    }

    fn accept_loop(
        &self,
        running: &AtomicBool,
        active: &Arc<AtomicUsize>,
        sessions: &Mutex<Vec<TcpStream>>,
    ) {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };

            if let Ok(clone) = stream.try_clone() {
                sessions.lock().push(clone);
            }

            let store = Arc::clone(&self.store);
            let session_active = Arc::clone(active);
            session_active.fetch_add(1, Ordering::SeqCst);
            thread::spawn(move || {
                let peer = stream.peer_addr().ok();
                info!(?peer, "connection accepted");
                let result = match stream.try_clone() {
                    Ok(write_half) => {
                        let mut session =
                            Session::new(BufReader::new(stream), write_half, store);
                        session.run()
                    }
                    Err(err) => Err(err.into()),
                };
                log_session_end(&result);
                session_active.fetch_sub(1, Ordering::SeqCst);
            });

            if !running.load(Ordering::SeqCst) {
                break;
            }
        }
        info!("accept loop stopped");
    }
}

/// Handle to a spawned server; dropping it leaves the server running.
pub struct ServerHandle {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    sessions: Arc<Mutex<Vec<TcpStream>>>,
    drain_timeout: Duration,
    thread: thread::JoinHandle<()>,
}

impl ServerHandle {
    /// Returns the address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shuts the server down gracefully.
    ///
    /// Sends a `STOP` to itself over loopback so the accept loop wakes
    /// and exits, waits for active sessions up to the drain window,
    /// then force-closes whatever is still connected.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);

        if let Err(err) = self.send_loopback_stop() {
            warn!(error = %err, "loopback stop failed");
        }

        let deadline = Instant::now() + self.drain_timeout;
        while self.active.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let stragglers = self.sessions.lock();
        let remaining = self.active.load(Ordering::SeqCst);
        if remaining > 0 {
            warn!(remaining, "force-closing sessions after drain window");
        }
        for stream in stragglers.iter() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        drop(stragglers);

        let _ = self.thread.join();
        info!("server stopped");
    }

    fn send_loopback_stop(&self) -> ServerResult<()> {
        let stream = TcpStream::connect(self.addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(1)))?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        // Server hello, then our VERSION, then STOP.
        read_block(&mut reader)?;
        write_block(&mut writer, [format!("VERSION {PROTOCOL_VERSION}").as_str()])?;
        write_block(&mut writer, ["STOP"])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_server() -> (tempfile::TempDir, ServerHandle) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), dir.path())
            .with_drain_timeout(Duration::from_millis(200));
        let handle = Server::bind(config).unwrap().spawn().unwrap();
        (dir, handle)
    }

    #[test]
    fn serves_and_stops() {
        let (_dir, handle) = spawn_server();
        let addr = handle.addr();

        let stream = TcpStream::connect(addr).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let hello = read_block(&mut reader).unwrap();
        assert!(hello[0].starts_with("VERSION "));

        write_block(&mut writer, ["VERSION 1"]).unwrap();
        write_block(&mut writer, ["LIST"]).unwrap();
        let listing = read_block(&mut reader).unwrap();
        assert!(listing.is_empty());

        write_block(&mut writer, ["STOP"]).unwrap();
        handle.stop();
    }

    #[test]
    fn stop_without_clients() {
        let (_dir, handle) = spawn_server();
        handle.stop();
    }
}
