//! 精确欧氏距离变换 (Felzenszwalb & Huttenlocher 可分离算法).

use ndarray::{Array3, Axis};

use crate::data::{GridAttr, Mask, ScalarField};

/// 计算前景体素到最近背景体素的欧氏距离, 单位与体素分辨率一致.
///
/// 背景体素距离为 0. 网格之外不视为背景, 因此没有任何背景体素时所有距离为正无穷.
pub fn distance_map(mask: &Mask) -> ScalarField {
    let cal = mask.calibration();
    let mut sq: Array3<f64> = mask.data().mapv(|p| if p { f64::INFINITY } else { 0.0 });

    let spacing2 = [cal.z_mm().powi(2), cal.xy_mm().powi(2), cal.xy_mm().powi(2)];
    let mut buf = Envelope::default();
    for (axis, s2) in spacing2.into_iter().enumerate().rev() {
        for mut lane in sq.lanes_mut(Axis(axis)) {
            buf.transform(lane.iter().copied(), s2);
            lane.iter_mut().zip(buf.out.iter()).for_each(|(d, v)| *d = *v);
        }
    }
    ScalarField::new(sq.mapv(|d| d.sqrt() as f32), cal)
}

/// 一维抛物线下包络的工作缓冲区, 在各条扫描线之间复用.
#[derive(Default)]
struct Envelope {
    f: Vec<f64>,
    v: Vec<usize>,
    z: Vec<f64>,
    out: Vec<f64>,
}

impl Envelope {
    /// `out[x] = min_q (s2 * (x - q)^2 + f[q])`.
    fn transform<I: Iterator<Item = f64>>(&mut self, f: I, s2: f64) {
        self.f.clear();
        self.f.extend(f);
        self.v.clear();
        self.z.clear();
        self.out.clear();

        let f = &self.f;
        for q in 0..f.len() {
            if !f[q].is_finite() {
                continue;
            }
            let fq = f[q] + s2 * (q * q) as f64;
            while let Some(&p) = self.v.last() {
                let fp = f[p] + s2 * (p * p) as f64;
                let s = (fq - fp) / (2.0 * s2 * (q - p) as f64);
                if self.z.last().is_some_and(|z| s <= *z) {
                    self.v.pop();
                    self.z.pop();
                } else {
                    self.v.push(q);
                    self.z.push(s);
                    break;
                }
            }
            if self.v.is_empty() {
                self.v.push(q);
                self.z.push(f64::NEG_INFINITY);
            }
        }

        if self.v.is_empty() {
            self.out.resize(f.len(), f64::INFINITY);
            return;
        }
        let mut k = 0;
        for x in 0..f.len() {
            while k + 1 < self.z.len() && self.z[k + 1] < x as f64 {
                k += 1;
            }
            let q = self.v[k];
            let d = x.abs_diff(q) as f64;
            self.out.push(s2 * d * d + f[q]);
        }
    }
}
