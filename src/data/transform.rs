// ============================================================
// Layer 4 - Image Transforms
// ============================================================
// Turns a decoded RGB image into the normalised CHW float vector
// the network consumes.
//
// Training pipeline (augmenting):
//   random resized crop → horizontal flip → color jitter
//   → to [0,1] floats → per-channel normalise
//
// Evaluation pipeline (deterministic):
//   resize shorter side → center crop → to [0,1] floats
//   → per-channel normalise
//
// Output layout is channel-major: all R values, then all G,
// then all B, each row-major, i.e. [3, size, size].

use image::{
    imageops::{self, FilterType},
    DynamicImage, Rgb32FImage, RgbImage,
};
use rand::{seq::SliceRandom, Rng};

/// ImageNet per-channel mean, RGB order
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation, RGB order
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Brightness, contrast and saturation jitter strength.
pub const JITTER_PARAM: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalize {
    fn default() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// Color jitter factors are drawn from `[1 - x, 1 + x]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorJitter {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl ColorJitter {
    pub fn uniform(strength: f32) -> Self {
        Self {
            brightness: strength,
            contrast: strength,
            saturation: strength,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainTransform {
    pub size: u32,
    pub scale: (f32, f32),
    pub ratio: (f32, f32),
    pub flip_prob: f32,
    pub jitter: ColorJitter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalTransform {
    /// Target length of the shorter side before cropping
    pub resize: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Train(TrainTransform),
    Eval(EvalTransform),
}

impl Transform {
    pub fn train(size: u32) -> Self {
        Transform::Train(TrainTransform {
            size,
            scale: (0.08, 1.0),
            ratio: (3.0 / 4.0, 4.0 / 3.0),
            flip_prob: 0.5,
            jitter: ColorJitter::uniform(JITTER_PARAM),
        })
    }

    pub fn eval(resize: u32, size: u32) -> Self {
        Transform::Eval(EvalTransform { resize, size })
    }

    /// Side length of the square output
    pub fn output_size(&self) -> u32 {
        match self {
            Transform::Train(t) => t.size,
            Transform::Eval(t) => t.size,
        }
    }

    /// Apply the pipeline and return a normalised `[3, size, size]` vector.
    pub fn apply<R: Rng + ?Sized>(&self, img: &RgbImage, norm: &Normalize, rng: &mut R) -> Vec<f32> {
        let float_img = match self {
            Transform::Train(t) => {
                let (x, y, w, h) = random_resized_crop_params(img.width(), img.height(), t.scale, t.ratio, rng);
                let cropped = imageops::crop_imm(img, x, y, w, h).to_image();
                let mut resized = imageops::resize(&cropped, t.size, t.size, FilterType::Triangle);
                if rng.gen::<f32>() < t.flip_prob {
                    imageops::flip_horizontal_in_place(&mut resized);
                }
                let mut f = DynamicImage::ImageRgb8(resized).to_rgb32f();
                color_jitter(&mut f, &t.jitter, rng);
                f
            }
            Transform::Eval(t) => {
                let resized = resize_shorter_side(img, t.resize);
                let cropped = center_crop(&resized, t.size);
                DynamicImage::ImageRgb8(cropped).to_rgb32f()
            }
        };
        to_chw_normalized(&float_img, norm)
    }
}

/// Sample a crop rectangle `(x, y, w, h)` covering a random area fraction
/// in `scale` with a random aspect ratio in `ratio` (log-uniform).
/// Falls back to a center crop clamped to `ratio` after ten misses.
pub fn random_resized_crop_params<R: Rng + ?Sized>(
    width: u32,
    height: u32,
    scale: (f32, f32),
    ratio: (f32, f32),
    rng: &mut R,
) -> (u32, u32, u32, u32) {
    let area = (width * height) as f32;
    let (log_lo, log_hi) = (ratio.0.ln(), ratio.1.ln());

    for _ in 0..10 {
        let target_area = area * rng.gen_range(scale.0..=scale.1);
        let aspect = rng.gen_range(log_lo..=log_hi).exp();
        let w = (target_area * aspect).sqrt().round() as u32;
        let h = (target_area / aspect).sqrt().round() as u32;
        if w > 0 && h > 0 && w <= width && h <= height {
            let x = rng.gen_range(0..=width - w);
            let y = rng.gen_range(0..=height - h);
            return (x, y, w, h);
        }
    }

    let in_ratio = width as f32 / height as f32;
    let (w, h) = if in_ratio < ratio.0 {
        (width, ((width as f32 / ratio.0).round() as u32).clamp(1, height))
    } else if in_ratio > ratio.1 {
        (((height as f32 * ratio.1).round() as u32).clamp(1, width), height)
    } else {
        (width, height)
    };
    ((width - w) / 2, (height - h) / 2, w, h)
}

/// Resize so the shorter side equals `target`, keeping aspect ratio.
pub fn resize_shorter_side(img: &RgbImage, target: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let (nw, nh) = if w <= h {
        (target, ((h as f64 * target as f64 / w as f64).round() as u32).max(1))
    } else {
        (((w as f64 * target as f64 / h as f64).round() as u32).max(1), target)
    };
    imageops::resize(img, nw, nh, FilterType::Triangle)
}

/// Crop a `size x size` square from the center, upscaling first if the
/// image is smaller than `size` along either side.
pub fn center_crop(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w < size || h < size {
        let scaled = imageops::resize(img, w.max(size), h.max(size), FilterType::Triangle);
        return center_crop(&scaled, size);
    }
    let x = (w - size) / 2;
    let y = (h - size) / 2;
    imageops::crop_imm(img, x, y, size, size).to_image()
}

fn color_jitter<R: Rng + ?Sized>(img: &mut Rgb32FImage, jitter: &ColorJitter, rng: &mut R) {
    let mut order = [0usize, 1, 2];
    order.shuffle(rng);

    for op in order {
        match op {
            0 => {
                let f = jitter_factor(jitter.brightness, rng);
                for p in img.pixels_mut() {
                    for c in p.0.iter_mut() {
                        *c = (*c * f).clamp(0.0, 1.0);
                    }
                }
            }
            1 => {
                let f = jitter_factor(jitter.contrast, rng);
                let n = (img.width() * img.height()).max(1) as f32;
                let mean = img.pixels().map(|p| grayscale(p.0)).sum::<f32>() / n;
                for p in img.pixels_mut() {
                    for c in p.0.iter_mut() {
                        *c = blend(*c, mean, f);
                    }
                }
            }
            _ => {
                let f = jitter_factor(jitter.saturation, rng);
                for p in img.pixels_mut() {
                    let gray = grayscale(p.0);
                    for c in p.0.iter_mut() {
                        *c = blend(*c, gray, f);
                    }
                }
            }
        }
    }
}

fn jitter_factor<R: Rng + ?Sized>(strength: f32, rng: &mut R) -> f32 {
    if strength <= 0.0 {
        return 1.0;
    }
    rng.gen_range((1.0 - strength).max(0.0)..=1.0 + strength)
}

fn grayscale([r, g, b]: [f32; 3]) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

fn blend(value: f32, other: f32, factor: f32) -> f32 {
    (factor * value + (1.0 - factor) * other).clamp(0.0, 1.0)
}

fn to_chw_normalized(img: &Rgb32FImage, norm: &Normalize) -> Vec<f32> {
    let plane = (img.width() * img.height()) as usize;
    let mut out = vec![0.0f32; 3 * plane];
    for (i, p) in img.pixels().enumerate() {
        for c in 0..3 {
            out[c * plane + i] = (p.0[c] - norm.mean[c]) / norm.std[c];
        }
    }
    out
}
