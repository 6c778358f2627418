/// Precompute a 1D Gaussian kernel of the given size.
///
/// `kernel_size` must be odd and >= 1. Sigma is derived as `kernel_size / 6.0`
/// (matching OpenCV's sigma=0 convention).
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let weights: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&w| (w / sum) as f32).collect()
}

/// Separable Gaussian blur of a single-channel f32 plane, edges clamped.
pub fn blur_plane(plane: &mut [f32], width: usize, height: usize, kernel_size: usize) {
    if kernel_size <= 1 || width == 0 || height == 0 {
        return;
    }
    debug_assert_eq!(plane.len(), width * height);
    let kernel = gaussian_kernel_1d(kernel_size);
    let half = (kernel_size / 2) as isize;
    let mut temp = vec![0.0f32; plane.len()];

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                sum += plane[y * width + sx] * w;
            }
            temp[y * width + x] = sum;
        }
    }

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                sum += temp[sy * width + x] * w;
            }
            plane[y * width + x] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_sums_to_one() {
        let kernel = gaussian_kernel_1d(15);
        assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_kernel_is_symmetric() {
        let kernel = gaussian_kernel_1d(9);
        for i in 0..4 {
            assert_relative_eq!(kernel[i], kernel[8 - i]);
        }
    }

    #[test]
    fn test_uniform_plane_unchanged() {
        let mut plane = vec![0.5f32; 20 * 10];
        blur_plane(&mut plane, 20, 10, 7);
        for v in plane {
            assert_relative_eq!(v, 0.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_blur_softens_step_edge() {
        let mut plane = vec![0.0f32; 20];
        for v in plane.iter_mut().skip(10) {
            *v = 1.0;
        }
        blur_plane(&mut plane, 20, 1, 5);
        assert!(plane[9] > 0.0 && plane[9] < 0.5);
        assert!(plane[10] > 0.5 && plane[10] < 1.0);
        assert_relative_eq!(plane[0], 0.0);
        assert_relative_eq!(plane[19], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_kernel_size_one_is_identity() {
        let mut plane = vec![0.0, 1.0, 0.0];
        blur_plane(&mut plane, 3, 1, 1);
        assert_eq!(plane, vec![0.0, 1.0, 0.0]);
    }
}
