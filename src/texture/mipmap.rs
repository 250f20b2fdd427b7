use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel};

/// Successive half-size levels starting with `base`. Stops at 1x1, or as
/// soon as the next level would drop below `min_size` on either axis.
pub fn mip_chain<P>(
    base: ImageBuffer<P, Vec<P::Subpixel>>,
    min_size: u32,
) -> Vec<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let mut levels = Vec::new();
    let mut current = base;

    loop {
        let (width, height) = current.dimensions();
        let next_width = (width / 2).max(1);
        let next_height = (height / 2).max(1);

        if (width == 1 && height == 1) || next_width < min_size || next_height < min_size {
            levels.push(current);
            return levels;
        }

        let smaller = imageops::resize(&current, next_width, next_height, FilterType::Triangle);
        levels.push(std::mem::replace(&mut current, smaller));
    }
}
