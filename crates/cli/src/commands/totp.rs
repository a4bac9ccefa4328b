use grid::totp::{Totp, seconds_remaining};
use serde_json::{Value, json};

use crate::cli::TotpArgs;
use crate::error::Result;

pub fn run(args: &TotpArgs) -> Result<Value> {
	let totp = Totp::from_base32(&args.secret)?;
	let at = match args.at {
		Some(at) => at,
		None => std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0),
	};
	Ok(json!({
		"code": totp.code_at(at),
		"at": at,
		"secondsRemaining": seconds_remaining(at),
	}))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn code_for_fixed_time() {
		let args = TotpArgs {
			secret: "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".into(),
			at: Some(59),
		};
		let out = run(&args).unwrap();
		assert_eq!(out["code"], "287082");
		assert_eq!(out["secondsRemaining"], 1);
	}
}
