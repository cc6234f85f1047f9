//! In-process mock compositor for driving `GammaClient` end to end.
//!
//! Advertises a configurable number of `wl_output`s and, optionally, the
//! wlroots gamma control manager. Every table received through `set_gamma`
//! is read back from its fd and recorded.

#![allow(dead_code)]

use std::fs::File;
use std::io::Read;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use wayland_server::backend::{ClientData, GlobalId};
use wayland_server::protocol::wl_output::{self, WlOutput};
use wayland_server::{Client, DataInit, Dispatch, Display, DisplayHandle, GlobalDispatch, New, Resource};

use wayland_protocols_wlr::gamma_control::v1::server::{
    zwlr_gamma_control_manager_v1::{self, ZwlrGammaControlManagerV1},
    zwlr_gamma_control_v1::{self, ZwlrGammaControlV1},
};

use wl_gammactl::{ClientOptions, GammaClient};

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub outputs: u32,
    pub ramp_size: u32,
    pub advertise_manager: bool,
    /// Index of the output whose `set_gamma` is answered with `failed`
    pub fail_output: Option<u32>,
    /// Accept the client but never dispatch its requests
    pub stall: bool,
    /// Shut the compositor down after this long
    pub lifetime: Option<Duration>,
    /// Send `failed` on this output's control once the delay has passed
    pub late_failure: Option<(u32, Duration)>,
    /// Withdraw this output's global once the delay has passed
    pub remove_output: Option<(u32, Duration)>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            outputs: 1,
            ramp_size: 256,
            advertise_manager: true,
            fail_output: None,
            stall: false,
            lifetime: None,
            late_failure: None,
            remove_output: None,
        }
    }
}

/// A table as the compositor saw it.
#[derive(Debug, Clone)]
pub struct ReceivedTable {
    /// Index of the output in creation order
    pub output: u32,
    pub values: Vec<u16>,
}

struct ServerState {
    config: MockConfig,
    received: Arc<Mutex<Vec<ReceivedTable>>>,
    controls_created: Arc<Mutex<u32>>,
    /// Output indices whose control the client destroyed
    controls_destroyed: Arc<Mutex<Vec<u32>>>,
    controls: Vec<(u32, ZwlrGammaControlV1)>,
}

struct TestClientData;

impl ClientData for TestClientData {}

impl GlobalDispatch<WlOutput, u32> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlOutput>,
        global_data: &u32,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, *global_data);
    }
}

impl Dispatch<WlOutput, u32> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &WlOutput,
        _request: wl_output::Request,
        _data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl GlobalDispatch<ZwlrGammaControlManagerV1, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<ZwlrGammaControlManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<ZwlrGammaControlManagerV1, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &ZwlrGammaControlManagerV1,
        request: zwlr_gamma_control_manager_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let zwlr_gamma_control_manager_v1::Request::GetGammaControl { id, output } = request {
            let output_index = output.data::<u32>().copied().unwrap_or(u32::MAX);
            let control = data_init.init(id, output_index);
            control.gamma_size(state.config.ramp_size);
            state.controls.push((output_index, control));
            *state.controls_created.lock().unwrap() += 1;
        }
    }
}

impl Dispatch<ZwlrGammaControlV1, u32> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &ZwlrGammaControlV1,
        request: zwlr_gamma_control_v1::Request,
        data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            zwlr_gamma_control_v1::Request::SetGamma { fd } => {
                let mut bytes = Vec::new();
                File::from(fd).read_to_end(&mut bytes).unwrap();
                let values = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                    .collect();
                state.received.lock().unwrap().push(ReceivedTable { output: *data, values });

                if state.config.fail_output == Some(*data) {
                    resource.failed();
                }
            }
            zwlr_gamma_control_v1::Request::Destroy => {
                state.controls.retain(|(_, control)| control != resource);
                state.controls_destroyed.lock().unwrap().push(*data);
            }
            _ => {}
        }
    }
}

pub struct MockCompositor {
    received: Arc<Mutex<Vec<ReceivedTable>>>,
    controls_created: Arc<Mutex<u32>>,
    controls_destroyed: Arc<Mutex<Vec<u32>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MockCompositor {
    /// Start the compositor and return it with a client connected to it.
    pub fn spawn(config: MockConfig, options: ClientOptions) -> (Self, GammaClient) {
        let (server_end, client_end) = UnixStream::pair().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let controls_created = Arc::new(Mutex::new(0));
        let controls_destroyed = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let state = ServerState {
            config,
            received: received.clone(),
            controls_created: controls_created.clone(),
            controls_destroyed: controls_destroyed.clone(),
            controls: Vec::new(),
        };
        let thread_stop = stop.clone();
        let thread = std::thread::spawn(move || serve(state, server_end, thread_stop));

        let conn = wayland_client::Connection::from_socket(client_end).unwrap();
        let client = GammaClient::from_connection(conn, options);

        (
            Self {
                received,
                controls_created,
                controls_destroyed,
                stop,
                thread: Some(thread),
            },
            client,
        )
    }

    pub fn received(&self) -> Vec<ReceivedTable> {
        self.received.lock().unwrap().clone()
    }

    pub fn controls_created(&self) -> u32 {
        *self.controls_created.lock().unwrap()
    }

    pub fn controls_destroyed(&self) -> Vec<u32> {
        self.controls_destroyed.lock().unwrap().clone()
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for MockCompositor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(mut state: ServerState, stream: UnixStream, stop: Arc<AtomicBool>) {
    let mut display: Display<ServerState> = Display::new().unwrap();
    let mut handle = display.handle();

    let output_globals: Vec<GlobalId> = (0..state.config.outputs)
        .map(|index| handle.create_global::<ServerState, WlOutput, u32>(1, index))
        .collect();
    if state.config.advertise_manager {
        handle.create_global::<ServerState, ZwlrGammaControlManagerV1, ()>(1, ());
    }
    handle.insert_client(stream, Arc::new(TestClientData)).unwrap();

    let mut late_failure = state.config.late_failure;
    let mut remove_output = state.config.remove_output;
    let started = Instant::now();
    while !stop.load(Ordering::SeqCst) {
        let elapsed = started.elapsed();
        if let Some(lifetime) = state.config.lifetime {
            if elapsed >= lifetime {
                break;
            }
        }
        if let Some((index, _)) = late_failure.filter(|(_, after)| elapsed >= *after) {
            for (_, control) in state.controls.iter().filter(|(output, _)| *output == index) {
                control.failed();
            }
            late_failure = None;
        }
        if let Some((index, _)) = remove_output.filter(|(_, after)| elapsed >= *after) {
            handle.remove_global::<ServerState>(output_globals[index as usize].clone());
            remove_output = None;
        }
        if !state.config.stall {
            let _ = display.dispatch_clients(&mut state);
            let _ = display.flush_clients();
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    // dropping the display closes the client socket
}

/// Table every channel of an identity adjustment should carry.
pub fn identity_ramp(size: u32) -> Vec<u16> {
    (0..size)
        .map(|i| (i as f64 / (size - 1) as f64 * 65535.0).round() as u16)
        .collect()
}
