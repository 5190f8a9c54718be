use md_vdp::{Vdp, VdpConfig, VdpSaveState, VideoStandard};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

// Headless frame renderer.
//
//   vdp_render [--state snapshot.bin] [--out frame.ppm] [--frames N] [--pal]
//
// Without --state a built-in test card is uploaded through the ports.
// Logging goes through RUST_LOG; DEBUG_VDP_* toggles add per-write traces.

struct Args {
    state: Option<PathBuf>,
    out: PathBuf,
    frames: u32,
    pal: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut parsed = Args {
        state: None,
        out: PathBuf::from("frame.ppm"),
        frames: 1,
        pal: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--state" => {
                let path = args.next().ok_or("--state needs a path")?;
                parsed.state = Some(PathBuf::from(path));
            }
            "--out" => {
                let path = args.next().ok_or("--out needs a path")?;
                parsed.out = PathBuf::from(path);
            }
            "--frames" => {
                let n = args.next().ok_or("--frames needs a count")?;
                parsed.frames = n
                    .parse::<u32>()
                    .map_err(|_| format!("invalid frame count '{}'", n))?;
            }
            "--pal" => parsed.pal = true,
            "--help" | "-h" => {
                return Err(
                    "Usage: vdp_render [--state snapshot.bin] [--out frame.ppm] [--frames N] [--pal]"
                        .to_string(),
                )
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(parsed)
}

/// Program the chip the way a boot ROM would: registers, palette, two
/// tiles, a plane A checkerboard and a handful of sprites.
fn upload_test_card(vdp: &mut Vdp) {
    for (index, value) in [
        (0x00u8, 0x04u8),
        (0x01, 0x54),
        (0x02, 0x30),
        (0x04, 0x07),
        (0x05, 0x6C),
        (0x07, 0x00),
        (0x0C, 0x81),
        (0x0D, 0x2F),
        (0x0F, 0x02),
        (0x10, 0x01),
    ] {
        vdp.write_control(0x8000 | ((index as u16) << 8) | value as u16);
    }

    // Palette 0: backdrop, red, green, blue, white
    vdp.write_control(0xC000);
    vdp.write_control(0x0000);
    for color in [0x0420u16, 0x000E, 0x00E0, 0x0E00, 0x0EEE] {
        vdp.write_data(color);
    }

    // Tile 1 solid color 1, tile 2 a color-2/3 stripe
    vdp.write_control(0x4020);
    vdp.write_control(0x0000);
    for _ in 0..16 {
        vdp.write_data(0x1111);
    }
    for _ in 0..8 {
        vdp.write_data(0x2323);
        vdp.write_data(0x3232);
    }

    // Plane A checkerboard over a 64x32 map at 0xC000
    vdp.write_control(0x4000);
    vdp.write_control(0x0003);
    for row in 0..32u16 {
        for col in 0..64u16 {
            let entry = if (row + col) % 2 == 0 { 0x0001 } else { 0x0000 };
            vdp.write_data(entry);
        }
    }

    // Four 2x2 high-priority sprites using the stripe tile
    vdp.write_control(0x5800);
    vdp.write_control(0x0003);
    for i in 0..4u16 {
        let link = if i == 3 { 0 } else { i + 1 };
        vdp.write_data(40 + i * 40);
        vdp.write_data(0x0500 | link);
        vdp.write_data(0x8002);
        vdp.write_data(32 + i * 64);
    }
}

fn write_ppm(path: &Path, vdp: &Vdp) -> std::io::Result<()> {
    let (width, height) = vdp.display_size();
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", width, height)?;
    for row in vdp.frame_buffer().chunks(md_vdp::FRAME_WIDTH).take(height) {
        for &rgb in &row[..width] {
            out.write_all(&[(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8])?;
        }
    }
    out.flush()
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(2);
        }
    };

    let mut config = VdpConfig::from_env();
    if args.pal {
        config.standard = VideoStandard::Pal;
    }
    let mut vdp = Vdp::with_config(config);

    match &args.state {
        Some(path) => {
            let state = match VdpSaveState::load_from_file(path) {
                Ok(state) => state,
                Err(e) => {
                    eprintln!("Failed to load {}: {}", path.display(), e);
                    process::exit(1);
                }
            };
            if let Err(e) = vdp.load_save_state(&state) {
                eprintln!("Snapshot rejected: {}", e);
                process::exit(1);
            }
        }
        None => upload_test_card(&mut vdp),
    }

    for _ in 0..args.frames.max(1) {
        vdp.run_frame();
    }

    let (overflow, collision) = vdp.get_sprite_flags();
    log::info!(
        "rendered {} frame(s); sprite overflow={} collision={} protocol errors={}",
        vdp.frame_count(),
        overflow,
        collision,
        vdp.protocol_error_count()
    );

    if let Err(e) = write_ppm(&args.out, &vdp) {
        eprintln!("Failed to write {}: {}", args.out.display(), e);
        process::exit(1);
    }
    println!("Wrote {}", args.out.display());
}
