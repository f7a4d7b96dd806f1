//! Fixed-step ODE integration.
//!
//! Implements 4th-order Runge-Kutta (RK4) for systems dy/dt = f(t, y), with an
//! optional per-step change limit and an optional floor on state values.
//!
//! RK4 is adequate for the gate and minimal glutamate models at dt = 0.1 h.
//! The strain metabolism model is stiff (ICD turnover of order 1e4 per hour)
//! and should use the implicit solver in [`super::adaptive`] instead.
//!
//! Reference: Press et al., Numerical Recipes, 3rd ed., Cambridge University Press 2007

use super::OdeSystem;

/// Configuration for the fixed-step integrator
#[derive(Debug, Clone)]
pub struct IntegratorConfig {
    /// Integration timestep in hours
    pub dt_h: f64,
    /// Maximum allowed change of any variable per step (for stability)
    pub max_change_per_step: f64,
    /// Optional lower bound on every variable
    pub min_value: Option<f64>,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            dt_h: 0.1,                  // 6 min timestep
            max_change_per_step: 1e12,  // Effectively unlimited
            min_value: Some(0.0),       // Concentrations and counts
        }
    }
}

/// 4th-order Runge-Kutta integrator
pub struct RK4Integrator {
    /// Configuration
    pub config: IntegratorConfig,
    /// Current simulation time in hours
    pub time_h: f64,
    /// Number of steps taken
    pub step_count: u64,
    /// Scratch vectors for intermediate calculations
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    y_temp: Vec<f64>,
}

impl RK4Integrator {
    /// Create a new RK4 integrator for a system with n variables
    pub fn new(n_variables: usize, config: IntegratorConfig) -> Self {
        Self {
            config,
            time_h: 0.0,
            step_count: 0,
            k1: vec![0.0; n_variables],
            k2: vec![0.0; n_variables],
            k3: vec![0.0; n_variables],
            k4: vec![0.0; n_variables],
            y_temp: vec![0.0; n_variables],
        }
    }

    fn resize(&mut self, n_variables: usize) {
        if self.k1.len() != n_variables {
            self.k1.resize(n_variables, 0.0);
            self.k2.resize(n_variables, 0.0);
            self.k3.resize(n_variables, 0.0);
            self.k4.resize(n_variables, 0.0);
            self.y_temp.resize(n_variables, 0.0);
        }
    }

    /// Perform one RK4 step of length `dt`
    ///
    /// # Arguments
    /// * `y` - Current state vector, modified in place
    /// * `derivatives` - Computes dy/dt given (t, y)
    /// * `dt` - Step length in hours
    ///
    /// # RK4 Algorithm
    /// k1 = f(t, y)
    /// k2 = f(t + dt/2, y + dt/2 * k1)
    /// k3 = f(t + dt/2, y + dt/2 * k2)
    /// k4 = f(t + dt, y + dt * k3)
    /// y_new = y + dt/6 * (k1 + 2*k2 + 2*k3 + k4)
    pub fn step_dt<F>(&mut self, y: &mut [f64], derivatives: F, dt: f64)
    where
        F: Fn(f64, &[f64], &mut [f64]),
    {
        let t = self.time_h;
        let n = y.len();
        self.resize(n);

        derivatives(t, y, &mut self.k1);

        for i in 0..n {
            self.y_temp[i] = y[i] + 0.5 * dt * self.k1[i];
        }
        derivatives(t + 0.5 * dt, &self.y_temp, &mut self.k2);

        for i in 0..n {
            self.y_temp[i] = y[i] + 0.5 * dt * self.k2[i];
        }
        derivatives(t + 0.5 * dt, &self.y_temp, &mut self.k3);

        for i in 0..n {
            self.y_temp[i] = y[i] + dt * self.k3[i];
        }
        derivatives(t + dt, &self.y_temp, &mut self.k4);

        let dt_6 = dt / 6.0;
        let limit = self.config.max_change_per_step;
        for i in 0..n {
            let dy = dt_6 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
            y[i] += dy.clamp(-limit, limit);
            if let Some(floor) = self.config.min_value {
                if y[i] < floor {
                    y[i] = floor;
                }
            }
        }

        self.time_h += dt;
        self.step_count += 1;
    }

    /// One step of the configured length
    pub fn step<F>(&mut self, y: &mut [f64], derivatives: F)
    where
        F: Fn(f64, &[f64], &mut [f64]),
    {
        let dt = self.config.dt_h;
        self.step_dt(y, derivatives, dt);
    }

    /// One step of an [`OdeSystem`]
    pub fn step_with<S: OdeSystem + ?Sized>(&mut self, sys: &S, y: &mut [f64], dt: f64) {
        self.step_dt(y, |t, state, dydt| sys.rhs(t, state, dydt), dt);
    }

    /// Advance by exactly `duration_h`
    ///
    /// Full steps of the configured length, then one shorter step for any
    /// remainder.
    pub fn run<F>(&mut self, y: &mut [f64], derivatives: F, duration_h: f64)
    where
        F: Fn(f64, &[f64], &mut [f64]),
    {
        let dt = self.config.dt_h;
        if !(dt > 0.0) || !(duration_h > 0.0) {
            return;
        }
        let t_end = self.time_h + duration_h;
        loop {
            let remaining = t_end - self.time_h;
            if remaining <= dt * 1e-9 {
                break;
            }
            self.step_dt(y, &derivatives, dt.min(remaining));
        }
        self.time_h = t_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rk4_exponential_decay() {
        // dy/dt = -y, y(0) = 1, so y(1) = exp(-1)
        let mut integrator = RK4Integrator::new(
            1,
            IntegratorConfig {
                dt_h: 0.01,
                max_change_per_step: 10.0,
                min_value: None,
            },
        );

        let mut y = vec![1.0];
        integrator.run(&mut y, |_, state, dydt| dydt[0] = -state[0], 1.0);

        let expected = (-1.0_f64).exp();
        let error = (y[0] - expected).abs();
        assert!(error < 1e-6, "RK4 error too large: {} vs expected {}", y[0], expected);
    }

    #[test]
    fn test_rk4_time_dependent_rhs() {
        // dy/dt = 2t, y(0) = 0, so y(2) = 4; exact for RK4
        let mut integrator = RK4Integrator::new(
            1,
            IntegratorConfig {
                dt_h: 0.1,
                max_change_per_step: 10.0,
                min_value: None,
            },
        );
        let mut y = vec![0.0];
        integrator.run(&mut y, |t, _, dydt| dydt[0] = 2.0 * t, 2.0);
        assert!((y[0] - 4.0).abs() < 1e-9, "got {}", y[0]);
        assert!((integrator.time_h - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_lands_on_duration() {
        // 1.05 h is not a multiple of 0.1 h; dy/dt = 1 integrates exactly
        let mut integrator = RK4Integrator::new(
            1,
            IntegratorConfig {
                dt_h: 0.1,
                max_change_per_step: 10.0,
                min_value: None,
            },
        );
        let mut y = vec![0.0];
        integrator.run(&mut y, |_, _, dydt| dydt[0] = 1.0, 1.05);
        assert_eq!(integrator.time_h, 1.05);
        assert!((y[0] - 1.05).abs() < 1e-12, "got {}", y[0]);
        assert_eq!(integrator.step_count, 11);
    }

    #[test]
    fn test_rk4_oscillator_half_period() {
        // y1' = y2, y2' = -y1, y1(pi) = -1
        let mut integrator = RK4Integrator::new(
            2,
            IntegratorConfig {
                dt_h: 0.001,
                max_change_per_step: 10.0,
                min_value: None,
            },
        );
        let mut y = vec![1.0, 0.0];
        integrator.run(
            &mut y,
            |_, state, dydt| {
                dydt[0] = state[1];
                dydt[1] = -state[0];
            },
            std::f64::consts::PI,
        );
        assert!((y[0] + 1.0).abs() < 1e-3, "y1(pi) = {}", y[0]);
    }

    #[test]
    fn test_floor_keeps_values_non_negative() {
        let mut integrator = RK4Integrator::new(1, IntegratorConfig::default());
        let mut y = vec![0.001];
        integrator.step(&mut y, |_, _, dydt| dydt[0] = -1000.0);
        assert_eq!(y[0], 0.0);
    }

    #[test]
    fn test_change_limit() {
        let mut integrator = RK4Integrator::new(
            1,
            IntegratorConfig {
                dt_h: 1.0,
                max_change_per_step: 0.5,
                min_value: None,
            },
        );
        let mut y = vec![0.0];
        integrator.step(&mut y, |_, _, dydt| dydt[0] = 100.0);
        assert!((y[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_step_count() {
        let mut integrator = RK4Integrator::new(1, IntegratorConfig::default());
        let mut y = vec![1.0];
        let derivatives = |_: f64, _: &[f64], dydt: &mut [f64]| dydt[0] = 0.0;

        assert_eq!(integrator.step_count, 0);
        integrator.step(&mut y, derivatives);
        assert_eq!(integrator.step_count, 1);
        integrator.step(&mut y, derivatives);
        assert_eq!(integrator.step_count, 2);
        assert!((integrator.time_h - 0.2).abs() < 1e-12);
    }
}
