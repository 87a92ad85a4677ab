//! rpio command-line tool
//!
//! Drives GPIO pins and SPI0 transfers from the shell, for board bring-up and
//! for checking wiring before a host application takes over.
//!
//! # Usage
//!
//! ```bash
//! # Show what was detected
//! rpio info
//!
//! # Print the 40-pin header map
//! rpio header
//!
//! # Drive GPIO 17 high
//! sudo rpio mode 17 out
//! sudo rpio write 17 1
//!
//! # Read a JEDEC ID with GPIO 8 as chip select, behind a 2-bit demux
//! sudo rpio spi transfer 9f0000 --cs 8 --aux 5=1 --aux 6=0 --divider 128
//! ```

mod parse;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::debug;

use rpio::header::{describe_physical, header_pins};
use rpio::platform;
use rpio::spi::clock_hz;
use rpio::{
    AuxPin, BitOrder, DataMode, EffectiveUser, PinNumbering, PlatformChoice, Privilege, Rpio,
    RpioConfig, Transfer,
};

/// Nominal core clock used to estimate SPI clock frequencies
const CORE_CLOCK_HZ: u32 = 250_000_000;

/// GPIO and SPI control for Raspberry Pi
#[derive(Parser)]
#[command(name = "rpio")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "GPIO pin and SPI0 transfer control for Raspberry Pi boards")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./rpio.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override platform detection
    #[arg(long, global = true, value_enum)]
    platform: Option<PlatformArg>,

    /// Pin arguments are physical header positions instead of BCM numbers
    #[arg(long, global = true)]
    physical: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Auto,
    Hardware,
    None,
}

impl From<PlatformArg> for PlatformChoice {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Auto => PlatformChoice::Auto,
            PlatformArg::Hardware => PlatformChoice::Hardware,
            PlatformArg::None => PlatformChoice::None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    In,
    Out,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Msb,
    Lsb,
}

impl From<OrderArg> for BitOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Msb => BitOrder::MsbFirst,
            OrderArg::Lsb => BitOrder::LsbFirst,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show detected platform, privilege and effective configuration
    Info,

    /// Print the physical header to BCM GPIO map
    Header,

    /// Configure a pin as input or output
    Mode {
        pin: u8,
        #[arg(value_enum)]
        direction: Direction,
    },

    /// Read a pin level
    Read { pin: u8 },

    /// Write a pin level (0/1, low/high)
    Write {
        pin: u8,
        #[arg(value_parser = parse::parse_level)]
        level: rpio::Level,
    },

    /// SPI0 operations
    #[command(subcommand)]
    Spi(SpiCommands),
}

#[derive(Subcommand)]
enum SpiCommands {
    /// Full-duplex transfer; prints the bytes clocked in
    Transfer {
        /// Bytes to send, as hex (e.g. 9f0000 or "9f 00 00")
        #[arg(value_parser = parse::parse_hex)]
        data: std::vec::Vec<u8>,

        /// Number of bytes to exchange (default: all of DATA)
        #[arg(short, long)]
        length: Option<usize>,

        /// Pin written before chip select, as PIN=LEVEL (repeatable, in order)
        #[arg(short, long, value_parser = parse::parse_aux)]
        aux: Vec<AuxPin>,

        /// Chip-select pin driven low around the transfer
        #[arg(long)]
        cs: Option<u8>,

        /// Data mode 0-3
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=3))]
        mode: Option<u8>,

        /// Bit order
        #[arg(short, long, value_enum)]
        order: Option<OrderArg>,

        /// Clock divider (SPI clock = core clock / divider)
        #[arg(short, long)]
        divider: Option<u16>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = RpioConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(platform) = cli.platform {
        config.platform = platform.into();
    }
    if cli.physical {
        config.numbering = PinNumbering::Physical;
    }
    debug!("effective config: {:?}", config);

    match cli.command {
        Commands::Info => handle_info(&config),
        Commands::Header => {
            print_header();
            Ok(())
        }
        Commands::Mode { pin, direction } => {
            let mut rpio = start(&config)?;
            let configured = match direction {
                Direction::In => rpio.set_input(pin),
                Direction::Out => rpio.set_output(pin),
            };
            configured.with_context(|| format!("Failed to configure pin {}", pin))?;
            println!("{} pin {} configured", "[OK]".green().bold(), pin);
            Ok(())
        }
        Commands::Read { pin } => {
            let mut rpio = start(&config)?;
            let level = rpio
                .read(pin)
                .with_context(|| format!("Failed to read pin {}", pin))?;
            println!("{}", level.as_int());
            Ok(())
        }
        Commands::Write { pin, level } => {
            let mut rpio = start(&config)?;
            rpio.write(pin, level)
                .with_context(|| format!("Failed to write pin {}", pin))?;
            println!("{} pin {} = {}", "[OK]".green().bold(), pin, level);
            Ok(())
        }
        Commands::Spi(cmd) => handle_spi(&config, cmd),
    }
}

/// Build a context from the configuration and start it
fn start(config: &RpioConfig) -> Result<Rpio> {
    let mut rpio = Rpio::from_config(config).context("Invalid configuration")?;
    rpio.start().context("Failed to start GPIO")?;
    if !rpio.is_hardware() {
        eprintln!(
            "{} No GPIO hardware detected; running without effect",
            "[WARNING]".yellow().bold()
        );
    }
    Ok(rpio)
}

/// Report detection results without starting the context
fn handle_info(config: &RpioConfig) -> Result<()> {
    let platform = platform::select(config.platform, config.peripheral_base);
    let spi = config.spi.to_spi_config()?;
    let rpio = Rpio::from_config(config).context("Invalid configuration")?;

    println!("{}", "=".repeat(60));
    println!("{}", "rpio".cyan().bold());
    println!("{}", "=".repeat(60));

    println!("\n{}", "Platform:".white().bold());
    if platform.is_hardware() {
        println!("  {} {}", "[OK]".green().bold(), platform);
    } else {
        println!("  {} {}", "[-]".yellow().bold(), platform);
    }
    println!("  Driver: {}", rpio.driver_name());
    println!("  Memory device: {}", config.memory_device.display());
    let root = if EffectiveUser.is_superuser() {
        "yes".green()
    } else {
        "no (start will fail on hardware)".red()
    };
    println!("  Running as root: {}", root);

    println!("\n{}", "Pin numbering:".white().bold());
    println!("  {:?}", rpio.numbering());

    println!("\n{}", "SPI defaults:".white().bold());
    println!(
        "  Clock divider: {} (~{} kHz at {} MHz core)",
        spi.clock_divider,
        clock_hz(CORE_CLOCK_HZ, spi.clock_divider) / 1000,
        CORE_CLOCK_HZ / 1_000_000
    );
    println!("  Data mode: {:?}", spi.data_mode);
    println!("  Bit order: {:?}", spi.bit_order);

    println!("\n{}", "=".repeat(60));
    Ok(())
}

fn print_header() {
    println!("{}", "=".repeat(40));
    println!("{}", "40-pin header".cyan().bold());
    println!("{}", "=".repeat(40));

    let pins = header_pins();
    for pair in pins.chunks(2) {
        let cell = |(physical, bcm): (u8, Option<u8>)| match bcm {
            Some(line) => format!("{:>2}: GPIO{:<2}", physical, line).white().bold(),
            None => format!("{:>2}: {:<6}", physical, describe_physical(physical)).dimmed(),
        };
        match pair {
            [left, right] => println!("  {}   {}", cell(*left), cell(*right)),
            [single] => println!("  {}", cell(*single)),
            _ => {}
        }
    }
    println!("{}", "=".repeat(40));
}

fn handle_spi(config: &RpioConfig, cmd: SpiCommands) -> Result<()> {
    match cmd {
        SpiCommands::Transfer {
            data,
            length,
            aux,
            cs,
            mode,
            order,
            divider,
        } => {
            let mut rpio = start(config)?;

            if let Some(divider) = divider {
                rpio.spi_set_clock_divider(divider)?;
            }
            if let Some(order) = order {
                rpio.spi_set_bit_order(order.into())?;
            }
            if let Some(mode) = mode {
                rpio.spi_set_data_mode(DataMode::try_from(mode)?)?;
            }

            let length = length.unwrap_or(data.len());
            let mut transfer = Transfer::new(&data, length).aux_pins(&aux);
            if let Some(pin) = cs {
                transfer = transfer.chip_select(pin);
            }

            println!(
                "{} {} bytes: {}",
                "[TX]".cyan().bold(),
                length,
                parse::format_hex(&data[..length.min(data.len())])
            );
            let rx = rpio.spi_transfer(&transfer).context("SPI transfer failed")?;
            println!("{} {} bytes: {}", "[RX]".green().bold(), rx.len(), parse::format_hex(&rx));
        }
    }

    Ok(())
}
