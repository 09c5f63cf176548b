use super::*;
use crate::output::history::InfrastructureLogEvent;
use crate::simulation::Simulation;

const TIME_TOLERANCE: f64 = 1e-9;

/// Starts throwing a switch. Commanding the position it already rests in,
/// or the target it is already moving to, does nothing.
pub fn begin_move(sim: &mut Simulation, switch: SwitchId, target: SwitchPosition) {
    let now = sim.time();
    let duration = sim.settings.switch_transition_time.max(0.0);
    {
        let sw = match sim.world.switches.get_mut(switch) {
            Some(sw) => sw,
            None => {
                log::debug!("move of unknown switch {}", switch);
                return;
            }
        };
        if sw.state == SwitchState::from(target) {
            log::debug!("switch {} already in {:?}", switch, target);
            return;
        }
        if sw.state == SwitchState::Moving && sw.target == target {
            return;
        }
        sw.state = SwitchState::Moving;
        sw.target = target;
        sw.started_at = now;
        sw.duration = duration;
    }
    log::debug!("switch {} moving to {:?}", sim.topology.switches[switch].id, target);
    sim.log_infrastructure(InfrastructureLogEvent::Switch(switch, SwitchState::Moving));
    sim.schedule_in(duration, Action::SwitchComplete { switch: switch, target: target });
}

/// Finishes a throw. Completions that no longer match the switch's current
/// transition are ignored.
pub fn complete_move(sim: &mut Simulation, switch: SwitchId, target: SwitchPosition) {
    let now = sim.time();
    {
        let sw = match sim.world.switches.get_mut(switch) {
            Some(sw) => sw,
            None => return,
        };
        if sw.state != SwitchState::Moving || sw.target != target ||
           now + TIME_TOLERANCE < sw.started_at + sw.duration {
            log::debug!("stale completion for switch {}", switch);
            return;
        }
        sw.state = SwitchState::from(target);
    }
    log::info!("switch {} now {:?}", sim.topology.switches[switch].id, target);
    sim.log_infrastructure(InfrastructureLogEvent::Switch(switch, SwitchState::from(target)));
}
