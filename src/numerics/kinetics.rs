//! Saturating rate laws shared by the circuit, metabolism and therapy models.
//!
//! Every switch-like response in the model reduces to one of three shapes:
//! - Hyperbolic (Michaelis-Menten) saturation
//! - Sigmoidal Hill activation, x^n / (K^n + x^n)
//! - Sigmoidal Hill repression, K^n / (K^n + x^n)
//!
//! References:
//! - Alon U. An Introduction to Systems Biology. 2nd ed. CRC Press, 2019 (Ch. 2)
//! - Cornish-Bowden A. Fundamentals of Enzyme Kinetics. 4th ed. Wiley-Blackwell, 2012

/// Floor added to saturating denominators so that K + x never divides by zero
pub const DENOMINATOR_EPS: f64 = 1e-12;

// ============================================================================
// Hyperbolic saturation
// ============================================================================

/// Michaelis-Menten rate
///
/// v = Vmax * [S] / (Km + [S])
///
/// # Arguments
/// * `vmax` - Maximum rate (concentration per hour)
/// * `km` - Half-saturation constant (same unit as `s`)
/// * `s` - Substrate level
///
/// # Reference
/// Michaelis L, Menten ML. Biochemische Zeitschrift. 1913;49:333-369
#[inline]
pub fn michaelis_menten(vmax: f64, km: f64, s: f64) -> f64 {
    if s <= 0.0 {
        return 0.0;
    }
    vmax * s / (km + s + DENOMINATOR_EPS)
}

/// Fractional saturation s / (K + s), in [0, 1)
#[inline]
pub fn saturation(k: f64, s: f64) -> f64 {
    michaelis_menten(1.0, k, s)
}

// ============================================================================
// Hill switches
// ============================================================================

/// Activating Hill fraction
///
/// f = x^n / (K^n + x^n)
///
/// Returns 0 for x <= 0 and tends to 1 for x >> K. Used for promoter
/// activation, T7-driven enzyme induction and the ferroptosis kill switch.
///
/// # Arguments
/// * `x` - Input signal
/// * `k_half` - Input giving half-maximal response
/// * `n` - Hill coefficient (steepness)
///
/// # Reference
/// Hill AV. Journal of Physiology. 1910;40:iv-vii
#[inline]
pub fn hill_activation(x: f64, k_half: f64, n: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let x_n = x.powf(n);
    let k_n = k_half.powf(n);
    x_n / (k_n + x_n + DENOMINATOR_EPS)
}

/// Repressing Hill fraction
///
/// f = 1 / (1 + (x/K)^n) = K^n / (K^n + x^n)
///
/// Returns 1 for x <= 0 and tends to 0 for x >> K.
#[inline]
pub fn hill_repression(x: f64, k_half: f64, n: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    1.0 / (1.0 + (x / k_half).powf(n))
}

/// Hill rate law with amplitude
///
/// v = Vmax * x^n / (K^n + x^n)
#[inline]
pub fn hill_kinetics(vmax: f64, k_half: f64, x: f64, n: f64) -> f64 {
    vmax * hill_activation(x, k_half, n)
}
