//! Auto-focus: turns noisy depth samples into a smoothly moving focal distance.

use glam::Vec2;

use crate::config::AutoFocusSettings;
use crate::focus::FocusSampler;
use crate::picking::SceneQuery;

/// Smoothing times at or below this snap straight to the target.
pub const SNAP_SMOOTH_TIME: f32 = 0.001;

/// Minimum gap kept between the near and far auto-focus limits.
const MIN_RANGE: f32 = 0.01;

/// Where on screen the auto-focus looks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutoFocusMode {
    /// One sample at the centre of the viewport.
    #[default]
    SinglePoint,
    /// Mean of a 3×3 grid around the centre, centre cell included.
    NinePointAverage,
}

/// One step of a critically damped spring towards `target`.
///
/// Moves `current` so that it reaches `target` in roughly `smooth_time`
/// seconds, updating `velocity` in place. The result never passes the target.
pub fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    // Polynomial fit of exp(-x), accurate over the range of frame times we see
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = target + (change + temp) * decay;

    // Stay between where we were and where we are going: no overshoot, no backtracking
    let lower = current.min(target);
    let upper = current.max(target);
    if !(lower..=upper).contains(&output) {
        output = output.clamp(lower, upper);
        *velocity = 0.0;
    }
    output
}

/// Debug overlay describing where focus is being sampled.
#[derive(Clone, Debug, PartialEq)]
pub struct FocusIndicator {
    /// Centre of the crosshair in pixels (origin top-left).
    pub crosshair: Vec2,
    /// The eight surrounding grid points in nine-point mode, empty otherwise.
    pub markers: Vec<Vec2>,
    /// Text shown under the crosshair.
    pub label: String,
}

/// Damped control loop over focus-distance samples.
#[derive(Clone, Debug)]
pub struct AutoFocusController {
    mode: AutoFocusMode,
    sample_radius: f32,
    offset: f32,
    smooth_time: f32,
    min_distance: f32,
    max_distance: f32,

    current_distance: f32,
    target_distance: f32,
    velocity: f32,
    last_measured: Option<f32>,
}

impl AutoFocusController {
    /// Create a controller resting at `initial_distance`.
    pub fn new(settings: &AutoFocusSettings, initial_distance: f32) -> Self {
        let mut controller = Self {
            mode: AutoFocusMode::SinglePoint,
            sample_radius: 0.05,
            offset: 0.0,
            smooth_time: 0.0,
            min_distance: 0.0,
            max_distance: 1.0,
            current_distance: initial_distance,
            target_distance: initial_distance,
            velocity: 0.0,
            last_measured: None,
        };
        controller.configure(settings);
        controller
    }

    /// Apply new settings while keeping the smoothed state.
    pub fn configure(&mut self, settings: &AutoFocusSettings) {
        self.mode = settings.mode;
        self.sample_radius = settings.sample_radius.clamp(f32::EPSILON, 1.0 - f32::EPSILON);
        self.offset = settings.offset;
        self.smooth_time = settings.smooth_time.max(0.0);

        let min = settings.min_distance.max(0.0);
        let mut max = settings.max_distance;
        if max <= min + MIN_RANGE {
            log::warn!(
                "Auto-focus range {}..{} is empty, widening to {}..{}",
                settings.min_distance,
                settings.max_distance,
                min,
                min + MIN_RANGE
            );
            max = min + MIN_RANGE;
        }
        self.min_distance = min;
        self.max_distance = max;

        if self.last_measured.is_some() {
            self.target_distance = self.target_distance.clamp(min, max);
            self.current_distance = self.current_distance.clamp(min, max);
        }
    }

    pub fn mode(&self) -> AutoFocusMode {
        self.mode
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn current_distance(&self) -> f32 {
        self.current_distance
    }

    pub fn target_distance(&self) -> f32 {
        self.target_distance
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Mean of the last batch of valid samples, before offset and clamping.
    pub fn last_measured_depth(&self) -> Option<f32> {
        self.last_measured
    }

    /// Put the controller at rest on `distance`, e.g. when auto-focus is switched on.
    ///
    /// Once a sample has been taken the distance is clamped into the
    /// configured range.
    pub fn reset_to(&mut self, distance: f32) {
        let distance = if self.last_measured.is_some() {
            distance.clamp(self.min_distance, self.max_distance)
        } else {
            distance
        };
        self.current_distance = distance;
        self.target_distance = distance;
        self.velocity = 0.0;
    }

    /// Normalized viewport points sampled in the current mode.
    pub fn sample_points(&self) -> Vec<Vec2> {
        match self.mode {
            AutoFocusMode::SinglePoint => vec![Vec2::splat(0.5)],
            AutoFocusMode::NinePointAverage => {
                let mut points = Vec::with_capacity(9);
                for x in -1..=1 {
                    for y in -1..=1 {
                        points.push(Vec2::new(
                            0.5 + x as f32 * self.sample_radius,
                            0.5 + y as f32 * self.sample_radius,
                        ));
                    }
                }
                points
            }
        }
    }

    /// Sample the scene and advance the smoothed distance by `dt` seconds.
    ///
    /// Returns `false` without touching any state when the sampler has no
    /// camera or loses it part-way through the batch.
    pub fn update<Q: SceneQuery + ?Sized>(&mut self, sampler: &FocusSampler<'_, Q>, dt: f32) -> bool {
        if !sampler.has_camera() {
            return false;
        }

        let mut samples = Vec::with_capacity(9);
        for point in self.sample_points() {
            let Some(depth) = sampler.sample(point.x, point.y) else {
                return false;
            };
            samples.push(depth);
        }

        self.step(&samples, dt);
        true
    }

    /// Advance the control loop with an already collected batch of samples.
    ///
    /// Non-positive samples are sampling failures and are ignored. With no
    /// valid sample the target is held and smoothing continues towards it.
    pub fn step(&mut self, samples: &[f32], dt: f32) {
        let (sum, count) = samples
            .iter()
            .filter(|depth| **depth > 0.0)
            .fold((0.0_f32, 0_u32), |(sum, count), depth| (sum + depth, count + 1));

        if count > 0 {
            let mean = sum / count as f32;
            if self.last_measured.is_none() {
                // First reading: start inside the allowed range so smoothing stays there
                self.current_distance = self
                    .current_distance
                    .clamp(self.min_distance, self.max_distance);
            }
            self.last_measured = Some(mean);
            self.target_distance = (mean + self.offset).clamp(self.min_distance, self.max_distance);
        }

        if self.smooth_time <= SNAP_SMOOTH_TIME {
            self.current_distance = self.target_distance;
            self.velocity = 0.0;
        } else {
            self.current_distance = smooth_damp(
                self.current_distance,
                self.target_distance,
                &mut self.velocity,
                self.smooth_time,
                dt,
            );
        }
    }

    /// Describe the sample pattern for a `width` × `height` pixel screen.
    pub fn indicator(&self, width: f32, height: f32) -> FocusIndicator {
        let centre = Vec2::new(width / 2.0, height / 2.0);
        let mut markers = Vec::new();

        if self.mode == AutoFocusMode::NinePointAverage {
            let radius_px = self.sample_radius * width;
            for x in -1..=1 {
                for y in -1..=1 {
                    if x == 0 && y == 0 {
                        continue;
                    }
                    markers.push(Vec2::new(
                        centre.x + x as f32 * radius_px,
                        centre.y - y as f32 * radius_px,
                    ));
                }
            }
        }

        FocusIndicator {
            crosshair: centre,
            markers,
            label: format!(
                "Focus: {:.1}m (Target: {:.1}m)",
                self.current_distance, self.target_distance
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::picking::Ray;

    fn settings() -> AutoFocusSettings {
        AutoFocusSettings::default().enabled(true)
    }

    /// Scene that answers every ray with the same distance.
    struct Constant(Option<f32>);

    impl SceneQuery for Constant {
        fn cast(&self, _ray: &Ray, max_distance: f32) -> Option<f32> {
            self.0.filter(|d| *d <= max_distance)
        }
    }

    #[test]
    fn nine_point_average_of_equal_samples() {
        let settings = settings()
            .mode(AutoFocusMode::NinePointAverage)
            .smooth_time(0.0);
        let mut focus = AutoFocusController::new(&settings, 2.0);
        let camera = Camera::new();
        let scene = Constant(Some(10.0));
        let sampler = FocusSampler::new(Some(&camera), &scene, focus.max_distance());

        assert_eq!(focus.sample_points().len(), 9);
        assert!(focus.update(&sampler, 1.0 / 60.0));
        assert!((focus.target_distance() - 10.0).abs() < 1e-5);
        assert!((focus.current_distance() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn nine_point_grid_includes_centre() {
        let focus = AutoFocusController::new(&settings().mode(AutoFocusMode::NinePointAverage), 2.0);
        let points = focus.sample_points();

        assert!(points.contains(&Vec2::splat(0.5)));
        assert!(points.contains(&Vec2::new(0.45, 0.55)));
        assert!(points.contains(&Vec2::new(0.55, 0.45)));
    }

    #[test]
    fn single_point_miss_clamps_to_max() {
        let mut focus = AutoFocusController::new(&settings().range(0.5, 60.0).smooth_time(0.0), 2.0);
        let camera = Camera::new();
        let scene = Constant(None);
        let sampler = FocusSampler::new(Some(&camera), &scene, 100.0);

        assert!(focus.update(&sampler, 0.016));
        assert_eq!(focus.target_distance(), 60.0);
    }

    #[test]
    fn miss_sentinel_within_range_is_used_as_is() {
        let mut focus = AutoFocusController::new(&settings().smooth_time(0.0), 2.0);
        let camera = Camera::new();
        let scene = Constant(None);
        let sampler = FocusSampler::new(Some(&camera), &scene, focus.max_distance());

        focus.update(&sampler, 0.016);
        assert_eq!(focus.target_distance(), 100.0);
    }

    #[test]
    fn missing_camera_leaves_state_untouched() {
        let mut focus = AutoFocusController::new(&settings(), 4.0);
        focus.step(&[20.0], 0.016);
        let before = (focus.current_distance(), focus.target_distance(), focus.velocity());

        let scene = Constant(Some(1.0));
        let sampler = FocusSampler::new(None, &scene, 100.0);
        assert!(!focus.update(&sampler, 0.016));

        assert_eq!(
            (focus.current_distance(), focus.target_distance(), focus.velocity()),
            before
        );
    }

    #[test]
    fn invalid_samples_hold_target() {
        let mut focus = AutoFocusController::new(&settings().smooth_time(0.0), 2.0);
        focus.step(&[12.0], 0.016);
        focus.step(&[0.0, -1.0], 0.016);

        assert_eq!(focus.target_distance(), 12.0);
        assert_eq!(focus.current_distance(), 12.0);
    }

    #[test]
    fn invalid_samples_are_excluded_from_mean() {
        let mut focus = AutoFocusController::new(&settings().smooth_time(0.0), 2.0);
        focus.step(&[0.0, 4.0, -3.0, 8.0], 0.016);

        assert_eq!(focus.target_distance(), 6.0);
        assert_eq!(focus.last_measured_depth(), Some(6.0));
    }

    #[test]
    fn offset_is_applied_before_clamping() {
        let mut s = settings().smooth_time(0.0);
        s.offset = -5.0;
        let mut focus = AutoFocusController::new(&s, 2.0);

        focus.step(&[20.0], 0.016);
        assert_eq!(focus.target_distance(), 15.0);

        focus.step(&[3.0], 0.016);
        assert_eq!(focus.target_distance(), 0.5);
    }

    #[test]
    fn target_stays_in_range_for_any_sample() {
        let mut focus = AutoFocusController::new(&settings().range(1.0, 30.0), 2.0);
        for depth in [0.001, 0.5, 1.0, 7.0, 29.9, 30.0, 1e6, f32::MAX] {
            focus.step(&[depth], 0.016);
            assert!(focus.target_distance() >= 1.0);
            assert!(focus.target_distance() <= 30.0);
            assert!(focus.current_distance() >= 1.0);
            assert!(focus.current_distance() <= 30.0);
        }
    }

    #[test]
    fn smoothing_approaches_step_without_overshoot() {
        let mut focus = AutoFocusController::new(&settings().smooth_time(0.15), 2.0);
        focus.step(&[2.0], 0.016);

        let mut previous = focus.current_distance();
        for _ in 0..200 {
            focus.step(&[10.0], 1.0 / 60.0);
            let current = focus.current_distance();
            assert!(current >= previous, "moved away from target");
            assert!(current <= 10.0, "overshot target: {}", current);
            previous = current;
        }
        assert!((previous - 10.0).abs() < 1e-3);
    }

    #[test]
    fn smoothing_downwards_never_undershoots() {
        let mut focus = AutoFocusController::new(&settings().smooth_time(0.5), 2.0);
        focus.step(&[80.0], 0.016);
        focus.reset_to(80.0);

        let mut previous = focus.current_distance();
        for _ in 0..100 {
            focus.step(&[3.0], 0.1);
            let current = focus.current_distance();
            assert!(current <= previous);
            assert!(current >= 3.0);
            previous = current;
        }
    }

    #[test]
    fn tiny_smooth_time_snaps() {
        let mut focus = AutoFocusController::new(&settings().smooth_time(0.0005), 2.0);
        focus.step(&[42.0], 0.016);

        assert_eq!(focus.current_distance(), 42.0);
        assert_eq!(focus.velocity(), 0.0);
    }

    #[test]
    fn first_reading_pulls_initial_distance_into_range() {
        let mut focus = AutoFocusController::new(&settings().range(5.0, 50.0).smooth_time(1.0), 0.1);
        focus.step(&[20.0], 0.001);

        assert!(focus.current_distance() >= 5.0);
    }

    #[test]
    fn reset_after_sampling_stays_in_range() {
        let mut focus = AutoFocusController::new(&settings().range(5.0, 50.0).smooth_time(1.0), 0.2);
        focus.step(&[20.0], 0.016);

        focus.reset_to(0.2);
        assert_eq!(focus.current_distance(), 5.0);
        assert_eq!(focus.target_distance(), 5.0);

        for _ in 0..5 {
            focus.step(&[20.0], 0.016);
            assert!(focus.current_distance() >= 5.0);
        }
    }

    #[test]
    fn empty_range_is_widened() {
        let focus = AutoFocusController::new(&settings().range(10.0, 10.0), 2.0);
        assert!(focus.min_distance() < focus.max_distance());
    }

    #[test]
    fn indicator_lists_surrounding_points_only() {
        let focus = AutoFocusController::new(&settings().mode(AutoFocusMode::NinePointAverage), 2.0);
        let indicator = focus.indicator(1000.0, 500.0);

        assert_eq!(indicator.crosshair, Vec2::new(500.0, 250.0));
        assert_eq!(indicator.markers.len(), 8);
        assert!(!indicator.markers.contains(&indicator.crosshair));
        assert!(indicator.markers.contains(&Vec2::new(450.0, 300.0)));
        assert_eq!(indicator.label, "Focus: 2.0m (Target: 2.0m)");
    }

    #[test]
    fn zero_dt_does_not_move() {
        let mut velocity = 0.0;
        assert_eq!(smooth_damp(1.0, 5.0, &mut velocity, 0.2, 0.0), 1.0);
    }
}
