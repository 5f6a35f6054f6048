use std::{
    fs,
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    os::{
        fd::{AsFd, BorrowedFd},
        unix::net::{UnixListener, UnixStream},
    },
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, info, warn};
use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags, PollTimeout},
};

use opus_shared::{
    read_control_message, write_control_message, ControlError, ControlRequest, ControlResponse,
};

use super::{Command, CommandBridge};
use crate::{
    error::OpusServerError,
    transport::{unix::remove_stale_socket, ListenAddr},
};

const CONTROL_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest the listener waits for a connection before rechecking its stop flag
const STOP_CHECK_INTERVAL_MS: u16 = 100;

enum ControlListener {
    Unix(UnixListener, PathBuf),
    Tcp(TcpListener),
}

impl ControlListener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            ControlListener::Unix(listener, _) => listener.as_fd(),
            ControlListener::Tcp(listener) => listener.as_fd(),
        }
    }

    fn accept(&self) -> std::io::Result<Box<dyn ReadWrite>> {
        match self {
            ControlListener::Unix(listener, _) => {
                let (stream, _) = listener.accept()?;
                if let Err(err) = stream.set_read_timeout(Some(CONTROL_READ_TIMEOUT)) {
                    warn!("could not set control read timeout: {}", err);
                }
                Ok(Box::new(stream))
            }
            ControlListener::Tcp(listener) => {
                let (stream, _) = listener.accept()?;
                if let Err(err) = stream.set_read_timeout(Some(CONTROL_READ_TIMEOUT)) {
                    warn!("could not set control read timeout: {}", err);
                }
                Ok(Box::new(stream))
            }
        }
    }
}

/// Blocking command-and-control listener. Serves one request per connection
/// by forwarding it through the [`CommandBridge`].
pub struct ControlServer {
    addr: ListenAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ControlServer {
    pub fn spawn(addr: &ListenAddr, bridge: Arc<CommandBridge>) -> Result<Self, OpusServerError> {
        let (listener, addr) = match addr {
            ListenAddr::Unix(path) => {
                remove_stale_socket(path)?;
                let listener = UnixListener::bind(path)?;
                (ControlListener::Unix(listener, path.clone()), addr.clone())
            }
            ListenAddr::Tcp(host_port) => {
                let listener = TcpListener::bind(host_port.as_str())?;
                let bound = listener.local_addr()?;
                (ControlListener::Tcp(listener), ListenAddr::tcp(bound.to_string()))
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("opus-control".to_string())
                .spawn(move || serve(listener, bridge, stop))?
        };

        info!("control channel listening on {}", addr);
        Ok(Self {
            addr,
            stop,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> &ListenAddr {
        &self.addr
    }

    /// Stops accepting requests and waits for the listener thread.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);

        // wake the listener early; otherwise it notices within one stop-check interval
        let woke = match &self.addr {
            ListenAddr::Unix(path) => UnixStream::connect(path).map(drop),
            ListenAddr::Tcp(host_port) => TcpStream::connect(host_port.as_str()).map(drop),
        };
        if let Err(err) = woke {
            debug!("could not wake control listener on {}: {}", self.addr, err);
        }
        if thread.join().is_err() {
            warn!("control listener thread panicked");
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn serve(listener: ControlListener, bridge: Arc<CommandBridge>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        let mut poll_fds = [PollFd::new(listener.as_fd(), PollFlags::POLLIN)];
        match poll(&mut poll_fds, PollTimeout::from(STOP_CHECK_INTERVAL_MS)) {
            Ok(0) | Err(Errno::EINTR) => continue,
            Ok(_) => {}
            Err(errno) => {
                warn!("control listener wait failed: {}", errno);
                break;
            }
        }

        if stop.load(Ordering::SeqCst) {
            break;
        }

        match listener.accept() {
            Ok(mut stream) => {
                if let Err(err) = handle_request(&mut stream, &bridge) {
                    debug!("control request failed: {}", err);
                }
            }
            Err(err) => warn!("control accept failed: {}", err),
        }
    }

    if let ControlListener::Unix(_, path) = &listener {
        if let Err(err) = fs::remove_file(path) {
            debug!("control socket {} already gone: {}", path.display(), err);
        }
    }
    debug!("control listener stopped");
}

trait ReadWrite: Read + Write {}

impl<T: Read + Write> ReadWrite for T {}

/// Reads one request, runs it through the bridge and writes the answer.
pub(crate) fn handle_request<S: Read + Write>(
    stream: &mut S,
    bridge: &CommandBridge,
) -> Result<(), ControlError> {
    let response = match read_control_message::<_, ControlRequest>(stream) {
        Ok(request) => {
            debug!("control request {:?}", request);
            bridge
                .submit(Command::from(request))
                .unwrap_or_else(|err| ControlResponse::failure(err.to_string()))
        }
        Err(ControlError::Malformed { reason }) => {
            ControlResponse::failure(format!("Malformed request: {}", reason))
        }
        Err(err) => return Err(err),
    };
    write_control_message(stream, &response)
}
