//! Runs a [`Conductor`] on its own thread.
//!
//! The thread is the only writer; everything else talks to it over a
//! command channel. The loop wakes on commands and on a fixed tick.

use crossbeam_channel::{bounded, select, tick, unbounded, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clock::{Clock, Timestamp};
use crate::config::ConductorConfig;
use crate::interfaces::{DeviceGateway, RundownStore};
use crate::models::{DeviceId, GroupId, Project, Resource};
use crate::playhead::PlayState;

use super::conductor::{Conductor, ConductorError, ControlCommand};

pub enum Command {
    Control {
        command: ControlCommand,
        reply: Sender<Result<(), ConductorError>>,
    },
    Sample {
        rundown_id: String,
        group_id: GroupId,
        reply: Sender<Result<PlayState, ConductorError>>,
    },
    ResourceUpdated {
        id: String,
        resource: Option<Resource>,
    },
    GatewayResources {
        device_id: DeviceId,
        resources: Vec<Resource>,
    },
    DeviceRefreshStatus {
        device_id: DeviceId,
        refreshing: bool,
    },
    ProjectChanged(Project),
    Shutdown,
}

pub struct Driver;

impl Driver {
    /// Rebuild all plans and start the conductor thread.
    pub fn spawn<S, G>(
        mut conductor: Conductor<S, G>,
        clock: Arc<dyn Clock>,
        config: &ConductorConfig,
    ) -> std::io::Result<DriverHandle<S, G>>
    where
        S: RundownStore + 'static,
        G: DeviceGateway + 'static,
    {
        let (sender, receiver) = unbounded::<Command>();
        let period = Duration::from_millis(config.tick_interval_ms.max(1));

        let thread = thread::Builder::new()
            .name("playout-conductor".to_string())
            .spawn(move || {
                conductor.rebuild_all_plans(clock.now());
                let ticker = tick(period);
                let mut running = true;
                while running {
                    select! {
                        recv(receiver) -> msg => match msg {
                            Ok(Command::Shutdown) | Err(_) => running = false,
                            Ok(command) => handle(&mut conductor, command, clock.now()),
                        },
                        recv(ticker) -> _ => conductor.tick(clock.now()),
                    }
                }
                conductor.begin_shutdown();
                conductor
            })?;

        Ok(DriverHandle {
            sender,
            thread: Some(thread),
        })
    }
}

fn handle<S: RundownStore, G: DeviceGateway>(
    conductor: &mut Conductor<S, G>,
    command: Command,
    now: Timestamp,
) {
    match command {
        Command::Control { command, reply } => {
            let _ = reply.send(conductor.execute(command, now));
        }
        Command::Sample {
            rundown_id,
            group_id,
            reply,
        } => {
            let _ = reply.send(conductor.sample_group(&rundown_id, &group_id, now));
        }
        Command::ResourceUpdated { id, resource } => {
            conductor.on_resource_updated(&id, resource, now)
        }
        Command::GatewayResources {
            device_id,
            resources,
        } => conductor.on_gateway_resources(&device_id, resources, now),
        Command::DeviceRefreshStatus {
            device_id,
            refreshing,
        } => conductor.on_device_refresh_status(&device_id, refreshing, now),
        Command::ProjectChanged(project) => conductor.on_project_changed(project, now),
        // Handled by the loop
        Command::Shutdown => {}
    }
}

/// Handle to the conductor thread. Dropping it stops and joins the thread.
pub struct DriverHandle<S: RundownStore, G: DeviceGateway> {
    sender: Sender<Command>,
    thread: Option<JoinHandle<Conductor<S, G>>>,
}

impl<S: RundownStore, G: DeviceGateway> DriverHandle<S, G> {
    pub fn sender(&self) -> Sender<Command> {
        self.sender.clone()
    }

    pub fn control(&self, command: ControlCommand) -> Result<(), ConductorError> {
        let (reply, response) = bounded(1);
        self.sender
            .send(Command::Control { command, reply })
            .map_err(|_| ConductorError::ShuttingDown)?;
        response.recv().map_err(|_| ConductorError::ShuttingDown)?
    }

    pub fn sample(&self, rundown_id: &str, group_id: &str) -> Result<PlayState, ConductorError> {
        let (reply, response) = bounded(1);
        self.sender
            .send(Command::Sample {
                rundown_id: rundown_id.to_string(),
                group_id: group_id.to_string(),
                reply,
            })
            .map_err(|_| ConductorError::ShuttingDown)?;
        response.recv().map_err(|_| ConductorError::ShuttingDown)?
    }

    /// Fire-and-forget delivery of an event.
    pub fn send(&self, command: Command) -> Result<(), ConductorError> {
        self.sender
            .send(command)
            .map_err(|_| ConductorError::ShuttingDown)
    }

    /// Stop the loop and hand the conductor back.
    pub fn shutdown(mut self) -> Result<Conductor<S, G>, ConductorError> {
        let _ = self.sender.send(Command::Shutdown);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ConductorError::WorkerPanicked),
            None => Err(ConductorError::ShuttingDown),
        }
    }
}

impl<S: RundownStore, G: DeviceGateway> Drop for DriverHandle<S, G> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.sender.send(Command::Shutdown);
            let _ = thread.join();
        }
    }
}
