use log::trace;
use tch::Tensor;

use crate::error::{DqnError, Result};
use crate::networks::mlp::MLP;

pub trait ToTensor {
    fn to_tensor(&self) -> Tensor;
}

/// 单个观测 -> `[1, dim]`
impl ToTensor for [f32] {
    fn to_tensor(&self) -> Tensor {
        Tensor::from_slice(self).unsqueeze(0)
    }
}

impl<const N: usize> ToTensor for [f32; N] {
    fn to_tensor(&self) -> Tensor {
        self[..].to_tensor()
    }
}

impl ToTensor for Vec<f32> {
    fn to_tensor(&self) -> Tensor {
        self[..].to_tensor()
    }
}

/// Stacks equally sized rows into a `[rows.len(), dim]` tensor.
pub fn stack_rows<'a, I>(rows: I, dim: usize) -> Tensor
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let flat: Vec<f32> = rows.into_iter().flatten().copied().collect();
    let n = (flat.len() / dim.max(1)) as i64;
    Tensor::from_slice(&flat).view([n, dim as i64])
}

/// Soft update of the target network, parameter by parameter:
///
/// dest = tau * src + (1.0 - tau) * dest
///
/// `tau == 0` leaves `dest` untouched and `tau == 1` copies `src` exactly.
pub fn track(dest: &mut MLP, src: &MLP, tau: f64) -> Result<()> {
    let src = src.var_store().variables();
    let mut dest = dest.var_store.variables();
    if src.len() != dest.len() {
        let missing = src
            .keys()
            .chain(dest.keys())
            .find(|k| !src.contains_key(*k) || !dest.contains_key(*k))
            .cloned()
            .unwrap_or_default();
        return Err(DqnError::ParameterSchema(missing));
    }
    if tau == 0.0 {
        return Ok(());
    }

    tch::no_grad(|| -> Result<()> {
        for (name, src) in src.iter() {
            let dest = dest
                .get_mut(name)
                .ok_or_else(|| DqnError::ParameterSchema(name.clone()))?;
            if tau == 1.0 {
                dest.copy_(src);
            } else {
                dest.copy_(&(src * tau + &*dest * (1.0 - tau)));
            }
        }
        Ok(())
    })?;
    trace!("soft update (tau = {tau})");
    Ok(())
}

#[cfg(feature = "plot")]
fn plot_error<E: std::fmt::Display>(e: E) -> DqnError {
    DqnError::Plot(e.to_string())
}

#[cfg(feature = "plot")]
pub fn plot_rewards(rewards: &[f32], filename: &str, title: &str) -> Result<()> {
    use plotters::prelude::*;

    let root = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    // 避免空图或全为 0
    let max_reward = rewards.iter().cloned().fold(f32::MIN, f32::max).max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 32).into_font())
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..rewards.len(), 0f32..max_reward)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Episode")
        .y_desc("Total Reward")
        .light_line_style(WHITE.mix(0.3))
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(
            rewards.iter().enumerate().map(|(i, r)| (i, *r)),
            &BLUE,
        ))
        .map_err(plot_error)?
        .label("Reward")
        .legend(|(x, y)| PathElement::new([(x, y), (x + 20, y)], BLUE));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    log::info!("Saved training plot to {}", filename);
    Ok(())
}
