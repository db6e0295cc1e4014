#[cfg(not(all(feature = "simulator", feature = "export")))]
fn main() {
    eprintln!("The magflux CLI requires the \"simulator\" and \"export\" features.");
    eprintln!("Rebuild with default features to enable swipe simulation.");
}

#[cfg(all(feature = "simulator", feature = "export"))]
mod cli {
    use std::env;
    use std::fs::File;
    use std::process;

    use anyhow::{bail, Context, Result};

    use magflux::decoder::{bits_from_transitions, decode_track};
    use magflux::device::{Device, STARTUP_BLINKS};
    use magflux::export::{export_to_wav, ExportConfig};
    use magflux::flux::HALF_PERIOD_US;
    use magflux::hal::sim::SimHal;
    use magflux::track::{TrackFormat, TrackIndex, TrackStore};

    struct Args {
        swipes: u32,
        wav_path: Option<String>,
        json_path: Option<String>,
    }

    fn usage() -> ! {
        eprintln!("Usage: magflux [--swipes N] [--wav PATH] [--json PATH]");
        eprintln!();
        eprintln!("Simulates button presses against the built-in card and verifies");
        eprintln!("the emitted flux waveform by decoding it reader-side.");
        eprintln!();
        eprintln!("  --swipes N   number of simulated presses (default 2)");
        eprintln!("  --wav PATH   render the final swipe's waveform to a WAV file");
        eprintln!("  --json PATH  dump all captured pin events as JSON");
        process::exit(1);
    }

    fn parse_args() -> Result<Args> {
        let mut args = Args {
            swipes: 2,
            wav_path: None,
            json_path: None,
        };
        let mut iter = env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--swipes" => {
                    let value = iter.next().unwrap_or_else(|| usage());
                    args.swipes = value
                        .parse()
                        .with_context(|| format!("invalid swipe count {value:?}"))?;
                }
                "--wav" => args.wav_path = Some(iter.next().unwrap_or_else(|| usage())),
                "--json" => args.json_path = Some(iter.next().unwrap_or_else(|| usage())),
                "--help" | "-h" => usage(),
                other => {
                    eprintln!("Unknown argument: {other}");
                    usage();
                }
            }
        }
        if args.swipes == 0 {
            bail!("at least one swipe is required");
        }
        Ok(args)
    }

    fn verify_swipe(index: TrackIndex, bits: &[bool]) -> Result<()> {
        let format = match index {
            TrackIndex::Primary => TrackFormat::IATA,
            TrackIndex::Secondary => TrackFormat::ABA,
        };
        let decoded =
            decode_track(bits, format).with_context(|| format!("decoding forward {index}"))?;
        if !decoded.lrc_ok {
            bail!("LRC mismatch on {index}");
        }
        println!("    forward {index} ({}): {:?}", format.name(), decoded.text);

        if index == TrackIndex::Primary {
            // Everything after the forward track is gap + reversed
            // secondary + trailer; reading it backwards restores a normal
            // forward stream
            let mut rest: Vec<bool> = bits[decoded.bits_consumed..].to_vec();
            rest.reverse();
            let companion = decode_track(&rest, TrackFormat::ABA)
                .context("decoding reversed companion track")?;
            if !companion.lrc_ok {
                bail!("LRC mismatch on reversed companion track");
            }
            println!("    reversed companion (ABA): {:?}", companion.text);
        }
        Ok(())
    }

    pub fn run() -> Result<()> {
        let args = parse_args()?;

        let store = TrackStore::validated().context("compiled-in track table")?;
        let hal = SimHal::new();
        for _ in 0..args.swipes {
            hal.script_press(100);
        }

        let mut device = Device::new(hal.clone(), store);
        let mut played = Vec::new();
        for _ in 0..args.swipes {
            played.push(device.run_once());
        }

        let windows: Vec<_> = hal
            .enable_windows()
            .into_iter()
            .skip(STARTUP_BLINKS as usize)
            .collect();
        let transitions = hal.coil_transitions();

        println!(
            "Simulated {} swipe(s), {:.1} ms of virtual time",
            args.swipes,
            hal.now_us() as f64 / 1_000.0
        );

        let mut last_swipe = Vec::new();
        for (n, (&index, &(start, end))) in played.iter().zip(&windows).enumerate() {
            let swipe: Vec<u64> = transitions
                .iter()
                .copied()
                .filter(|&t| t >= start && t <= end)
                .map(|t| t - start)
                .collect();
            let bits = bits_from_transitions(&swipe, u64::from(HALF_PERIOD_US));
            println!(
                "  swipe {}: {index}, {} transitions, {} bits",
                n + 1,
                swipe.len(),
                bits.len()
            );
            verify_swipe(index, &bits)?;
            last_swipe = swipe;
        }

        if let Some(path) = &args.wav_path {
            export_to_wav(&last_swipe, ExportConfig::default(), path)
                .with_context(|| format!("writing {path}"))?;
            println!("Wrote final swipe waveform to {path}");
        }

        if let Some(path) = &args.json_path {
            let file = File::create(path).with_context(|| format!("creating {path}"))?;
            serde_json::to_writer_pretty(file, &hal.events())
                .with_context(|| format!("writing {path}"))?;
            println!("Wrote pin-event capture to {path}");
        }

        Ok(())
    }
}

#[cfg(all(feature = "simulator", feature = "export"))]
fn main() -> anyhow::Result<()> {
    cli::run()
}
