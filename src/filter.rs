//! Separable 2D Gaussian smoothing over [`ndarray`] arrays.
//!
//! The kernel radius and border handling match the common convolution
//! defaults for this kind of filter: radius `⌊4σ + 0.5⌋` and reflected
//! borders (`d c b a | a b c d | d c b a`). A sigma of zero (or below)
//! leaves the input untouched.

use ndarray::{Array1, Array2, ArrayView2};

/// Builds a normalized 1D Gaussian kernel for the given standard deviation.
///
/// Returns the single-element identity kernel for `sigma <= 0`.
pub fn gaussian_kernel(sigma: f64) -> Array1<f64> {
    let radius = kernel_radius(sigma);
    if radius == 0 {
        return Array1::from_elem(1, 1.0);
    }
    let mut kernel = Array1::from_iter((-(radius as i64)..=radius as i64).map(|offset| {
        let x = offset as f64;
        (-x * x / (2.0 * sigma * sigma)).exp()
    }));
    let sum = kernel.sum();
    kernel.mapv_inplace(|w| w / sum);
    kernel
}

fn kernel_radius(sigma: f64) -> usize {
    if sigma <= 0.0 {
        return 0;
    }
    (4.0 * sigma + 0.5) as usize
}

/// Reflects an out-of-bounds index back into `0..len`.
fn reflect(index: i64, len: i64) -> usize {
    let period = 2 * len;
    let mut i = ((index % period) + period) % period;
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

/// Applies the kernel along one row-major axis of the image.
fn convolve_rows(image: &Array2<f64>, kernel: &Array1<f64>) -> Array2<f64> {
    let (height, width) = image.dim();
    let radius = (kernel.len() / 2) as i64;
    let mut output = Array2::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect(x as i64 + k as i64 - radius, width as i64);
                acc += image[(y, sx)] * weight;
            }
            output[(y, x)] = acc;
        }
    }
    output
}

/// Smooths a 2D sample grid with a separable Gaussian of the given sigma.
///
/// The output always has the same shape as the input.
pub fn gaussian_smooth(image: ArrayView2<'_, f64>, sigma: f64) -> Array2<f64> {
    let image = image.to_owned();
    if kernel_radius(sigma) == 0 {
        return image;
    }
    let kernel = gaussian_kernel(sigma);
    // Separable filter: horizontal pass, then the same kernel over the
    // transposed view for the vertical pass.
    let horizontal = convolve_rows(&image, &kernel);
    let vertical = convolve_rows(&horizontal.t().to_owned(), &kernel);
    vertical.t().to_owned()
}
