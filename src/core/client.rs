//! Wayland client driving the gamma adjustment.
//!
//! The run is split into barrier-gated phases:
//! 1. `discover()` - bind `wl_output`s and the gamma manager, roundtrip,
//!    then require the manager
//! 2. `bind_controls()` - create a gamma control per output, roundtrip so
//!    every `gamma_size` has arrived
//! 3. `apply()` - fill and submit one table per output, roundtrip to surface
//!    immediate rejections
//! 4. `run()` - dispatch until the connection closes, keeping the tables
//!    applied and watching for late `failed` events
//!
//! A `failed` event for any output aborts the whole run.

use std::io;
use std::os::unix::io::AsFd;
use std::time::{Duration, Instant};

use wayland_client::backend::WaylandError;
use wayland_client::protocol::{wl_callback, wl_output::WlOutput, wl_registry};
use wayland_client::{delegate_noop, Connection, Dispatch, EventQueue, QueueHandle};

use crate::config::Adjustment;
use crate::core::buffer::SharedTable;
use crate::core::errors::{GammaError, Result};
use crate::core::protocol::wlr_gamma_control_unstable_v1::{
    zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1,
    zwlr_gamma_control_v1::{self, ZwlrGammaControlV1},
};
use crate::core::ramp;
use crate::core::registry::{GlobalKind, OutputRegistry};
use crate::core::session::{deliver_event, GammaSession, SessionState};
use crate::core::sync::{self, BarrierTracker};

/// Interface versions this client speaks
const WL_OUTPUT_VERSION: u32 = 1;
const GAMMA_MANAGER_VERSION: u32 = 1;

// ============================================================================
// Options and reports
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Upper bound for every roundtrip; `None` waits forever.
    pub roundtrip_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedOutput {
    /// Global name of the `wl_output`
    pub output: u32,
    pub ramp_size: u32,
}

/// What `apply()` submitted, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub outputs: Vec<AppliedOutput>,
}

// ============================================================================
// Per-output state
// ============================================================================

#[derive(Debug)]
pub struct Output {
    wl_output: WlOutput,
    control: Option<ZwlrGammaControlV1>,
    session: GammaSession,
}

impl Output {
    fn new(name: u32, wl_output: WlOutput) -> Self {
        Self {
            wl_output,
            control: None,
            session: GammaSession::new(name),
        }
    }

    pub fn session(&self) -> &GammaSession {
        &self.session
    }

    /// Destroying the control makes the compositor restore the output's ramps.
    fn release(self) {
        if let Some(control) = self.control {
            control.destroy();
        }
    }
}

// ============================================================================
// Dispatch state
// ============================================================================

/// Everything the event handlers mutate.
#[derive(Debug, Default)]
pub struct GammaState {
    /// Global name and proxy of the gamma control manager
    manager: Option<(u32, ZwlrGammaControlManagerV1)>,
    outputs: OutputRegistry<Output>,
    barriers: BarrierTracker,
}

impl GammaState {
    fn announce(
        &mut self,
        registry: &wl_registry::WlRegistry,
        name: u32,
        interface: &str,
        version: u32,
        qh: &QueueHandle<Self>,
    ) {
        match GlobalKind::from_interface(interface) {
            Some(GlobalKind::Output) => {
                tracing::debug!("Output global {} announced (v{})", name, version);
                let wl_output = registry.bind::<WlOutput, _, _>(name, WL_OUTPUT_VERSION, qh, ());
                if let Some(stale) = self.outputs.insert(name, Output::new(name, wl_output)) {
                    stale.release();
                }
            }
            Some(GlobalKind::GammaManager) => {
                tracing::debug!("Gamma control manager announced as global {} (v{})", name, version);
                let manager =
                    registry.bind::<ZwlrGammaControlManagerV1, _, _>(name, GAMMA_MANAGER_VERSION, qh, ());
                if let Some((_, previous)) = self.manager.replace((name, manager)) {
                    previous.destroy();
                }
            }
            None => {}
        }
    }

    fn remove_global(&mut self, name: u32) {
        if let Some(output) = self.outputs.remove(name) {
            tracing::info!("Output {} removed, releasing its gamma control", name);
            output.release();
        } else if matches!(self.manager, Some((manager_name, _)) if manager_name == name) {
            tracing::warn!("Gamma control manager global {} removed", name);
            if let Some((_, manager)) = self.manager.take() {
                manager.destroy();
            }
        }
    }

    fn first_failure(&self) -> Option<u32> {
        self.outputs
            .iter()
            .find(|(_, output)| output.session.is_failed())
            .map(|(name, _)| name)
    }

    fn check_failures(&self) -> Result<()> {
        match self.first_failure() {
            Some(output) => Err(GammaError::ControlFailed { output }),
            None => Ok(()),
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for GammaState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => state.announce(registry, name, &interface, version, qh),
            wl_registry::Event::GlobalRemove { name } => state.remove_global(name),
            _ => {}
        }
    }
}

// The u32 user data is the global name of the output the control belongs to
impl Dispatch<ZwlrGammaControlV1, u32> for GammaState {
    fn event(
        state: &mut Self,
        _proxy: &ZwlrGammaControlV1,
        event: zwlr_gamma_control_v1::Event,
        name: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match state.outputs.get_mut(*name) {
            Some(output) => deliver_event(&mut output.session, event),
            None => tracing::debug!("Dropping {:?} for released output {}", event, name),
        }
    }
}

impl Dispatch<wl_callback::WlCallback, u32> for GammaState {
    fn event(
        state: &mut Self,
        _proxy: &wl_callback::WlCallback,
        event: wl_callback::Event,
        id: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            state.barriers.complete(*id);
        }
    }
}

delegate_noop!(GammaState: ignore WlOutput);
delegate_noop!(GammaState: ignore ZwlrGammaControlManagerV1);

// ============================================================================
// Client
// ============================================================================

pub struct GammaClient {
    conn: Connection,
    queue: EventQueue<GammaState>,
    state: GammaState,
    registry: Option<wl_registry::WlRegistry>,
    options: ClientOptions,
}

impl GammaClient {
    /// Connect to the compositor named by the environment.
    pub fn connect(options: ClientOptions) -> Result<Self> {
        let conn = Connection::connect_to_env()?;
        tracing::info!("Connected to Wayland display");
        Ok(Self::from_connection(conn, options))
    }

    pub fn from_connection(conn: Connection, options: ClientOptions) -> Self {
        let queue = conn.new_event_queue();
        Self {
            conn,
            queue,
            state: GammaState::default(),
            registry: None,
            options,
        }
    }

    pub fn has_manager(&self) -> bool {
        self.state.manager.is_some()
    }

    pub fn outputs(&self) -> impl Iterator<Item = (u32, &Output)> + '_ {
        self.state.outputs.iter()
    }

    /// Bind the globals and require the gamma control manager.
    pub fn discover(&mut self) -> Result<()> {
        let qh = self.queue.handle();
        if self.registry.is_none() {
            self.registry = Some(self.conn.display().get_registry(&qh, ()));
        }

        self.queue.flush()?;
        self.queue.dispatch_pending(&mut self.state)?;
        self.barrier()?;

        if !self.has_manager() {
            return Err(GammaError::MissingManager);
        }
        tracing::info!("Discovered {} output(s)", self.state.outputs.len());
        Ok(())
    }

    /// Create a gamma control for every output that has none yet.
    pub fn bind_controls(&mut self) -> Result<()> {
        let manager = match self.state.manager.as_ref() {
            Some((_, manager)) => manager.clone(),
            None => return Err(GammaError::MissingManager),
        };
        let qh = self.queue.handle();

        for (name, output) in self.state.outputs.iter_mut() {
            if output.session.state() != SessionState::Unbound {
                continue;
            }
            output.session.bind()?;
            output.control = Some(manager.get_gamma_control(&output.wl_output, &qh, name));
            tracing::debug!("Requested gamma control for output {}", name);
        }

        self.barrier()
    }

    /// `discover()` followed by `bind_controls()`.
    pub fn prepare(&mut self) -> Result<()> {
        self.discover()?;
        self.bind_controls()
    }

    /// Fill and submit a table for every bound output.
    pub fn apply(&mut self, adjustment: &Adjustment) -> Result<ApplyReport> {
        self.apply_with(adjustment, |_| {})
    }

    /// Like `apply()`, calling `on_submit` for each output right before its
    /// table is handed to the compositor.
    pub fn apply_with<F>(&mut self, adjustment: &Adjustment, mut on_submit: F) -> Result<ApplyReport>
    where
        F: FnMut(&AppliedOutput),
    {
        adjustment.validate()?;
        let mut report = ApplyReport::default();

        for (name, output) in self.state.outputs.iter_mut() {
            let Some(control) = output.control.as_ref() else {
                tracing::warn!("Output {} appeared after binding, skipping", name);
                continue;
            };

            let ramp_size = output.session.submission_size()?;
            let mut table = SharedTable::allocate(ramp_size)?;
            ramp::fill(table.as_mut_slice(), ramp_size, adjustment)?;

            let applied = AppliedOutput {
                output: name,
                ramp_size,
            };
            on_submit(&applied);

            control.set_gamma(table.as_fd());
            output.session.mark_submitted()?;
            // the compositor holds its own copy of the fd from here on
            drop(table);

            tracing::info!("Submitted gamma table for output {} (ramp size {})", name, ramp_size);
            report.outputs.push(applied);
        }

        self.barrier()?;
        for (_, output) in self.state.outputs.iter_mut() {
            output.session.acknowledge();
        }
        Ok(report)
    }

    /// Dispatch until the compositor closes the connection.
    ///
    /// The tables stay applied only while the gamma controls are alive, so
    /// this is where the process spends its lifetime.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if let Err(err) = self.queue.blocking_dispatch(&mut self.state) {
                let err = GammaError::from(err);
                if !err.is_connection_closed() {
                    return Err(err);
                }
                tracing::info!("Wayland connection closed: {}", err);
                return self.state.check_failures();
            }
            self.state.check_failures()?;
        }
    }

    fn barrier(&mut self) -> Result<()> {
        match self.options.roundtrip_timeout {
            Some(limit) => self.bounded_roundtrip(limit)?,
            None => {
                self.queue.roundtrip(&mut self.state)?;
            }
        }
        self.state.check_failures()
    }

    fn bounded_roundtrip(&mut self, limit: Duration) -> Result<()> {
        let id = self.state.barriers.issue();
        let _callback = self.conn.display().sync(&self.queue.handle(), id);
        let deadline = Instant::now() + limit;
        tracing::trace!("Barrier {} issued (limit {:?})", id, limit);

        loop {
            self.queue.dispatch_pending(&mut self.state)?;
            if self.state.barriers.is_reached(id) {
                tracing::trace!("Barrier {} reached", id);
                return Ok(());
            }

            self.queue.flush()?;
            let Some(guard) = self.queue.prepare_read() else {
                continue;
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            let readable = !remaining.is_zero()
                && sync::wait_readable(guard.connection_fd(), remaining).map_err(GammaError::Poll)?;
            if !readable {
                tracing::error!("Compositor did not answer barrier {} within {:?}", id, limit);
                return Err(GammaError::Timeout(limit));
            }

            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}
