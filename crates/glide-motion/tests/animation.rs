use anyhow::Result;
use glide_config::GlideConfig;
use glide_motion::generators::{Generator, SpringGenerator, SpringOptions, calc_generator_duration};
use glide_motion::{AnimatableValue, ManualClock, MotionContext, MotionValue, Transition, ValueTarget, animate_motion_value};
use std::cell::RefCell;
use std::rc::Rc;

fn context() -> (ManualClock, MotionContext) {
    let clock = ManualClock::new();
    let ctx = MotionContext::new(clock.clone(), GlideConfig::default());
    (clock, ctx)
}

fn run_frames(clock: &ManualClock, ctx: &MotionContext, frames: usize) {
    for _ in 0..frames {
        clock.advance(16.0);
        ctx.scheduler().process_frame();
    }
}

#[test]
fn spring_settles_within_its_probed_duration() -> Result<()> {
    let config = GlideConfig::default();
    let options = SpringOptions::new(0.0, 1.0).with_physics(100.0, 10.0, 1.0).with_rest(2.0, 0.5);
    let mut generator = Generator::Spring(SpringGenerator::new(&options, &config)?);

    let duration = calc_generator_duration(&mut generator, &config.generator);
    assert!(duration.is_finite() && duration > 0.0, "{duration}");
    assert!(generator.next(duration).done);
    Ok(())
}

#[test]
fn springs_with_equal_physics_move_in_lockstep() -> Result<()> {
    for damping in [10.0, 20.0, 40.0] {
        let (clock, ctx) = context();
        let a = MotionValue::new(ctx.scheduler(), 0.0);
        let b = MotionValue::new(ctx.scheduler(), 0.0);
        let transition = Transition::spring(100.0, damping);
        animate_motion_value(&ctx, "x", &a, 100.0.into(), &transition.clone().into(), None);
        animate_motion_value(&ctx, "x", &b, 100.0.into(), &transition.into(), None);

        for _ in 0..300 {
            run_frames(&clock, &ctx, 1);
            assert_eq!(a.get(), b.get(), "damping {damping}");
        }
        assert!(!a.is_animating());
        assert_eq!(a.get_f64(), Some(100.0));
    }
    Ok(())
}

#[test]
fn velocity_tracks_writes_across_frames() -> Result<()> {
    let (clock, ctx) = context();
    let value = MotionValue::new(ctx.scheduler(), 0.0);
    value.set(10.0);
    clock.advance(100.0);
    value.set(20.0);
    assert!((value.get_velocity() - 100.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn wildcard_keyframe_starts_from_the_current_string() -> Result<()> {
    let (clock, ctx) = context();
    let value = MotionValue::new(ctx.scheduler(), "10px");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _subscription = value.on_change({
        let seen = seen.clone();
        move |latest: &AnimatableValue| seen.borrow_mut().push(latest.clone())
    });

    let target = ValueTarget::Keyframes(vec![None, Some("20px".into())]);
    animate_motion_value(&ctx, "width", &value, target, &Transition::tween(200.0).into(), None);
    run_frames(&clock, &ctx, 30);

    assert_eq!(value.get(), AnimatableValue::from("20px"));
    let seen = seen.borrow();
    assert!(seen.len() > 2);
    for latest in seen.iter() {
        assert!(latest.as_str().is_some_and(|s| s.ends_with("px")), "{latest:?}");
        let px = latest.as_f64().unwrap_or(f64::NAN);
        assert!((10.0..=20.0).contains(&px), "{px}");
    }
    Ok(())
}
