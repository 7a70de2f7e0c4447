//! Runs a simulation on a dedicated thread, controlled through a command channel.

use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{debug, info, warn};

use crate::config::Parameters;
use crate::render::Frame;
use crate::simulation::Simulation;
use crate::stats::{Statistics, VehicleDetail};
use crate::VehicleId;

/// Step delays at or below this many ms run steps back to back.
const MIN_SLEEP: u64 = 10;

/// A request to the simulation thread.
#[derive(Clone, Debug)]
pub enum Command {
    /// Run steps continuously.
    Start,
    /// Stop running steps.
    Stop,
    /// Run a single step of the configured length.
    NextStep,
    /// Remove all vehicles and restart the statistics.
    Reset,
    UpdateParameters(Parameters),
    SetViewport { width: f64, height: f64 },
    Select(Option<VehicleId>),
    /// End the thread after the current step.
    Shutdown,
}

/// The state published after every step.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub statistics: Statistics,
    /// The details of the selected vehicle.
    pub detail: Option<VehicleDetail>,
    /// The draw points of the network and its vehicles.
    pub frame: Frame,
    /// Whether steps are being run continuously.
    pub running: bool,
    /// Whether the termination condition has been met.
    pub terminated: bool,
}

impl Snapshot {
    fn new(simulation: &Simulation, running: bool) -> Self {
        Self {
            statistics: simulation.statistics().clone(),
            detail: simulation.selected_detail(),
            frame: simulation.frame(),
            running,
            terminated: simulation.is_terminated(),
        }
    }
}

type SharedSnapshot = Arc<RwLock<Arc<Snapshot>>>;

/// Owns the thread a simulation runs on.
///
/// Commands are handled between steps, so a step always runs to completion.
/// The simulation is handed back by [SimulationRunner::join].
pub struct SimulationRunner {
    commands: Sender<Command>,
    snapshot: SharedSnapshot,
    thread: Option<JoinHandle<Simulation>>,
}

impl SimulationRunner {
    /// Moves a simulation onto a new thread. It starts out stopped.
    pub fn spawn(simulation: Simulation) -> Self {
        let (commands, receiver) = unbounded();
        let snapshot = Arc::new(RwLock::new(Arc::new(Snapshot::new(&simulation, false))));
        let shared = snapshot.clone();
        let thread = thread::spawn(move || run(simulation, receiver, shared));
        info!("simulation thread started");
        Self {
            commands,
            snapshot,
            thread: Some(thread),
        }
    }

    /// Sends a command to the simulation thread. Commands sent after it ended are dropped.
    pub fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("simulation thread is gone, command dropped");
        }
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Gets the most recently published state.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Shuts the thread down and returns the simulation, or `None` if the thread panicked.
    pub fn join(mut self) -> Option<Simulation> {
        self.send(Command::Shutdown);
        self.thread.take()?.join().ok()
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown);
            let _ = thread.join();
        }
    }
}

fn publish(shared: &SharedSnapshot, simulation: &Simulation, running: bool) {
    let snapshot = Arc::new(Snapshot::new(simulation, running));
    match shared.write() {
        Ok(mut guard) => *guard = snapshot,
        Err(poisoned) => *poisoned.into_inner() = snapshot,
    }
}

/// Handles a command, returning `false` once the thread should end.
fn handle(simulation: &mut Simulation, command: Command, running: &mut bool) -> bool {
    debug!("runner command: {:?}", command);
    match command {
        Command::Start => {
            if simulation.is_terminated() {
                info!("simulation has terminated, not starting");
            } else {
                simulation.restart_clock();
                *running = true;
            }
        }
        Command::Stop => *running = false,
        Command::NextStep => {
            let seconds = simulation.parameters().next_step as f64 / 1000.0;
            simulation.step(seconds);
        }
        Command::Reset => simulation.reset(),
        Command::UpdateParameters(parameters) => {
            simulation.apply_parameters(parameters);
        }
        Command::SetViewport { width, height } => simulation.set_viewport(width, height),
        Command::Select(vehicle) => simulation.select(vehicle),
        Command::Shutdown => return false,
    }
    true
}

fn run(mut simulation: Simulation, commands: Receiver<Command>, shared: SharedSnapshot) -> Simulation {
    let mut running = false;
    loop {
        if running {
            let mut alive = true;
            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if !handle(&mut simulation, command, &mut running) {
                            alive = false;
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        alive = false;
                        break;
                    }
                }
            }
            if !alive {
                break;
            }
            if !running {
                publish(&shared, &simulation, running);
                continue;
            }

            let report = simulation.step_wall_clock();
            if report.terminated {
                info!("simulation terminated after {} steps", simulation.statistics().step_count);
                running = false;
            }
            publish(&shared, &simulation, running);

            let delay = simulation.parameters().step_delay;
            if delay > MIN_SLEEP {
                thread::sleep(Duration::from_millis(delay));
            }
        } else {
            match commands.recv() {
                Ok(command) => {
                    if !handle(&mut simulation, command, &mut running) {
                        break;
                    }
                    publish(&shared, &simulation, running);
                }
                Err(_) => break,
            }
        }
    }
    info!("simulation thread stopped");
    simulation
}
