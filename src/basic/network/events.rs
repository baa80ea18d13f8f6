use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ControllerRef, MergeStatus, Network, PhaseControlMode, Side};
use crate::basic::error::NetworkError;

/// State changes of a [`Network`].
///
/// The first group are commands accepted by [`Network::apply`]; the last two
/// variants are only emitted as derived notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetworkEvent {
    BusDisabled {
        bus: usize,
        disabled: bool,
    },
    BranchDisabled {
        branch: usize,
        disabled: bool,
    },
    BranchSideConnectivityChanged {
        branch: usize,
        side: Side,
        connected: bool,
    },
    ShuntDisabled {
        shunt: usize,
        disabled: bool,
    },
    HvdcDisabled {
        hvdc: usize,
        disabled: bool,
    },
    ControllerEnabledChanged {
        controller: ControllerRef,
        enabled: bool,
    },
    PhaseControlModeChanged {
        control: usize,
        mode: PhaseControlMode,
    },
    VoltageControlMergeChanged {
        control: usize,
        status: MergeStatus,
        merged: Vec<usize>,
    },
    /// A bus lost or regained its path to the reference bus.
    BusIsolationChanged {
        bus: usize,
        isolated: bool,
    },
    /// A zero impedance branch entered or left the spanning forest.
    SpanningTreeChanged {
        branch: usize,
        spanning: bool,
    },
}

/// Observer of network changes, called once per emitted notification.
pub trait NetworkListener {
    fn on_network_event(&mut self, network: &Network, event: &NetworkEvent);
}

impl Network {
    fn check_target(&self, event: &NetworkEvent) -> Result<(), NetworkError> {
        let check = |element: &'static str, num: usize, len: usize| {
            if num < len {
                Ok(())
            } else {
                Err(NetworkError::UnknownEventTarget { element, num })
            }
        };
        match *event {
            NetworkEvent::BusDisabled { bus, .. }
            | NetworkEvent::BusIsolationChanged { bus, .. } => check("bus", bus, self.buses.len()),
            NetworkEvent::BranchDisabled { branch, .. }
            | NetworkEvent::BranchSideConnectivityChanged { branch, .. }
            | NetworkEvent::SpanningTreeChanged { branch, .. } => {
                check("branch", branch, self.branches.len())
            }
            NetworkEvent::ShuntDisabled { shunt, .. } => check("shunt", shunt, self.shunts.len()),
            NetworkEvent::HvdcDisabled { hvdc, .. } => check("hvdc", hvdc, self.hvdcs.len()),
            NetworkEvent::ControllerEnabledChanged { controller, .. } => match controller {
                ControllerRef::GeneratorVoltage(b) | ControllerRef::GeneratorReactivePower(b) => {
                    check("bus", b, self.buses.len())
                }
                ControllerRef::TransformerVoltage(br)
                | ControllerRef::TransformerReactivePower(br)
                | ControllerRef::PhaseShifter(br) => check("branch", br, self.branches.len()),
                ControllerRef::ShuntVoltage(s) => check("shunt", s, self.shunts.len()),
            },
            NetworkEvent::PhaseControlModeChanged { control, .. } => {
                check("phase control", control, self.phase_controls.len())
            }
            NetworkEvent::VoltageControlMergeChanged {
                control, ref merged, ..
            } => std::iter::once(control)
                .chain(merged.iter().copied())
                .try_for_each(|vc| check("voltage control", vc, self.voltage_controls.len())),
        }
    }

    /// Applies a command and returns the notifications it produced.
    ///
    /// A command that does not change anything yields no notification. A
    /// topological change is followed by the isolation and spanning tree
    /// changes it induced. Nothing changes when the command is rejected.
    pub fn apply(&mut self, event: &NetworkEvent) -> Result<Vec<NetworkEvent>, NetworkError> {
        self.check_target(event)?;
        let changed = match *event {
            NetworkEvent::BusDisabled { bus, disabled } => {
                std::mem::replace(&mut self.buses[bus].disabled, disabled) != disabled
            }
            NetworkEvent::BranchDisabled { branch, disabled } => {
                std::mem::replace(&mut self.branches[branch].disabled, disabled) != disabled
            }
            NetworkEvent::BranchSideConnectivityChanged {
                branch,
                side,
                connected,
            } => {
                let slot = &mut self.branches[branch].connected[side.idx()];
                std::mem::replace(slot, connected) != connected
            }
            NetworkEvent::ShuntDisabled { shunt, disabled } => {
                std::mem::replace(&mut self.shunts[shunt].disabled, disabled) != disabled
            }
            NetworkEvent::HvdcDisabled { hvdc, disabled } => {
                std::mem::replace(&mut self.hvdcs[hvdc].disabled, disabled) != disabled
            }
            NetworkEvent::ControllerEnabledChanged { controller, enabled } => {
                let slot = match controller {
                    ControllerRef::GeneratorVoltage(b) => {
                        &mut self.buses[b].generator_voltage_control_enabled
                    }
                    ControllerRef::GeneratorReactivePower(b) => {
                        &mut self.buses[b].generator_reactive_power_control_enabled
                    }
                    ControllerRef::TransformerVoltage(br) => {
                        &mut self.branches[br].voltage_control_enabled
                    }
                    ControllerRef::TransformerReactivePower(br) => {
                        &mut self.branches[br].reactive_power_control_enabled
                    }
                    ControllerRef::PhaseShifter(br) => &mut self.branches[br].phase_control_enabled,
                    ControllerRef::ShuntVoltage(s) => &mut self.shunts[s].voltage_control_enabled,
                };
                std::mem::replace(slot, enabled) != enabled
            }
            NetworkEvent::PhaseControlModeChanged { control, mode } => {
                std::mem::replace(&mut self.phase_controls[control].mode, mode) != mode
            }
            NetworkEvent::VoltageControlMergeChanged {
                control,
                status,
                ref merged,
            } => {
                let vc = &mut self.voltage_controls[control];
                let changed = vc.merge_status != status || vc.merged != *merged;
                vc.merge_status = status;
                vc.merged = merged.clone();
                if changed {
                    self.rebuild_index();
                }
                changed
            }
            NetworkEvent::BusIsolationChanged { .. } => {
                return Err(NetworkError::NotACommand {
                    event: "bus isolation change",
                });
            }
            NetworkEvent::SpanningTreeChanged { .. } => {
                return Err(NetworkError::NotACommand {
                    event: "spanning tree change",
                });
            }
        };
        if !changed {
            return Ok(Vec::new());
        }
        debug!(?event, "network changed");

        let mut notifications = vec![event.clone()];
        if matches!(
            event,
            NetworkEvent::BusDisabled { .. }
                | NetworkEvent::BranchDisabled { .. }
                | NetworkEvent::BranchSideConnectivityChanged { .. }
        ) {
            let old_spanning: Vec<bool> = (0..self.branches.len())
                .map(|b| self.is_spanning_tree_edge(b))
                .collect();
            for bus in self.update_topology() {
                notifications.push(NetworkEvent::BusIsolationChanged {
                    bus,
                    isolated: self.is_bus_isolated(bus),
                });
            }
            for (branch, was) in old_spanning.into_iter().enumerate() {
                let spanning = self.is_spanning_tree_edge(branch);
                if spanning != was {
                    notifications.push(NetworkEvent::SpanningTreeChanged { branch, spanning });
                }
            }
        }
        Ok(notifications)
    }
}
