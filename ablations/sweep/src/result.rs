//! 实验结果.

use crate::algos::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.3}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Empty volumes: {}", p.get_trivial())?;
    writeln!(w, "{S4}Segmented volumes: {}", p.get_target())?;
    writeln!(w, "{S4}Seeds in total: {}", p.get_seeds())?;
    writeln!(w, "{S4}Fusions in total: {}", p.get_fusions())?;
    writeln!(
        w,
        "{S4}Average regions: {} per volume",
        f64_to_display(p.get_avg_regions())
    )?;
    writeln!(w, "{S4}Effective total time: {} us", p.get_target_time_us())?;
    writeln!(
        w,
        "{S4}Effective average time: {} us",
        f64_to_display(p.get_avg_target_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    match p.get_most_time_consuming() {
        Some(d) => write!(w, "{S4}Most time-consuming volume costs {} us", d.as_micros())?,
        None => write!(w, "{S4}Most time-consuming volume costs / us")?,
    }
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (key, profile) in self.data.iter() {
            if let Err(e) = describe_into(key, profile, &mut buf) {
                log::error!("Cannot describe `{key}`: {e}");
            }
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();

            utils::sep();
        }
    }
}
