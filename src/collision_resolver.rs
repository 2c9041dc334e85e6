// Collision/Merge Resolver - Turns a reported contact into a merge or an explosive impact
//
// Merge:           m = m1 + m2, r = cbrt(r1³ + r2³), barycentric position and velocity.
//                  The merged body appears after a short delay via the event queue.
// ExplosiveImpact: Earth-role primary hit by an Asteroid-role impactor.
//                  Both die, nothing is created, flash + debris at the surface.

use log::info;
use rand::rngs::StdRng;

use crate::effects::{ActiveEffect, EffectRequest};
use crate::lifecycle::{EventQueue, ScheduledEvent};
use crate::physics_engine::{Body, BodyId, BodyRegistry, BodyRole, BodySpec, PhysicsWorld, Vector3};
use crate::scene::SceneGraph;

/// Fraction of the primary radius where the impact point sits
const SURFACE_FACTOR: f64 = 0.98;

/// Outcome of one `resolve_contact` call
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ignored,
    Merged {
        sources: (BodyId, BodyId),
        merged: BodySpec,
        due_at: f64,
    },
    ExplosiveImpact {
        primary: BodyId,
        impactor: BodyId,
        impact_point: Vector3,
        normal: Vector3,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    Merge,
    Impact { primary: BodyId, impactor: BodyId },
}

/// Everything the resolver touches besides the registry
pub struct ResolveContext<'a> {
    pub physics: &'a mut dyn PhysicsWorld,
    pub scene: &'a mut dyn SceneGraph,
    pub rng: &'a mut StdRng,
    pub effects: &'a mut Vec<ActiveEffect>,
    pub events: &'a mut EventQueue,
    pub now: f64,
    pub merge_delay: f64,
}

pub fn classify_pair(a: &Body, b: &Body) -> PairKind {
    match (a.role, b.role) {
        (BodyRole::Earth, BodyRole::Asteroid) => PairKind::Impact {
            primary: a.id,
            impactor: b.id,
        },
        (BodyRole::Asteroid, BodyRole::Earth) => PairKind::Impact {
            primary: b.id,
            impactor: a.id,
        },
        _ => PairKind::Merge,
    }
}

/// The body two sources combine into. Name follows `a`; identity follows the heavier body
/// (on a tie, `b`).
pub fn merge_bodies(a: &Body, b: &Body) -> BodySpec {
    let mass = a.mass + b.mass;
    let heavier = if a.mass > b.mass { a } else { b };

    let radius = (a.radius.powi(3) + b.radius.powi(3)).cbrt();
    let position = a.position.scale(a.mass).add(&b.position.scale(b.mass)).scale(1.0 / mass);
    let velocity = a.momentum().add(&b.momentum()).scale(1.0 / mass);

    BodySpec {
        name: format!("Merged-{}", a.name),
        role: heavier.role,
        texture_key: heavier.texture_key.clone(),
        mass,
        radius,
        position,
        velocity,
    }
}

/// Impact point and outward normal on the primary's surface, facing the impactor
pub fn impact_geometry(primary: &Body, impactor: &Body) -> (Vector3, Vector3) {
    let mut normal = impactor.position.sub(&primary.position).normalize();
    if normal.magnitude_squared() < 0.5 {
        normal = Vector3::UP;
    }
    let point = primary
        .position
        .add(&normal.scale(primary.radius * SURFACE_FACTOR));
    (point, normal)
}

/// Resolve a contact between `a` and `b`. Repeated or stale contacts are ignored.
pub fn resolve_contact(
    registry: &mut BodyRegistry,
    a: BodyId,
    b: BodyId,
    ctx: &mut ResolveContext<'_>,
) -> Resolution {
    if a == b {
        return Resolution::Ignored;
    }
    let (Some(body_a), Some(body_b)) = (registry.get(a), registry.get(b)) else {
        return Resolution::Ignored;
    };
    if !body_a.alive || !body_b.alive {
        return Resolution::Ignored;
    }

    match classify_pair(body_a, body_b) {
        PairKind::Impact { primary, impactor } => {
            let (p, i) = if primary == a { (body_a, body_b) } else { (body_b, body_a) };
            let (impact_point, normal) = impact_geometry(p, i);
            let reference_radius = p.radius;
            info!("explosive impact: {} hit {} at {:?}", i.name, p.name, impact_point);

            // The impactor's flame trail sees its source die and fades out on its own
            explode(registry, primary, impactor, ctx);
            ctx.effects.push(ActiveEffect::spawn(
                EffectRequest::FlashShockwave,
                impact_point,
                &mut *ctx.scene,
                &mut *ctx.rng,
            ));
            ctx.effects.push(ActiveEffect::spawn(
                EffectRequest::DebrisBurst {
                    normal,
                    reference_radius,
                },
                impact_point,
                &mut *ctx.scene,
                &mut *ctx.rng,
            ));

            Resolution::ExplosiveImpact {
                primary,
                impactor,
                impact_point,
                normal,
            }
        }
        PairKind::Merge => {
            let merged = merge_bodies(body_a, body_b);
            info!(
                "merging {} + {} -> {} (mass {:.2})",
                body_a.name, body_b.name, merged.name, merged.mass
            );

            for id in [a, b] {
                if let Some(body) = registry.get_mut(id) {
                    body.alive = false;
                }
            }

            let due_at = ctx.now + ctx.merge_delay;
            ctx.events
                .schedule(due_at, ScheduledEvent::SpawnMerged(merged.clone()));

            Resolution::Merged {
                sources: (a, b),
                merged,
                due_at,
            }
        }
    }
}

/// Kill both bodies; the impactor leaves the physics world and the view right away
fn explode(registry: &mut BodyRegistry, primary: BodyId, impactor: BodyId, ctx: &mut ResolveContext<'_>) {
    if let Some(body) = registry.get_mut(primary) {
        body.alive = false;
    }
    if let Some(body) = registry.get_mut(impactor) {
        body.alive = false;
        if let Some(handle) = body.physics.take() {
            ctx.physics.remove_body(handle);
        }
        if let Some(visual) = body.visual {
            ctx.scene.set_visible(visual, false);
        }
    }
}
