use std::env;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::sync::mpsc;
use std::thread;

use log::error;

use rv32emu::cpu::Cpu;

/// Feed stdin to the channel one byte at a time; the main loop injects them
/// into the UART whenever the receive register is free.
fn spawn_stdin_reader() -> mpsc::Receiver<u8> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut byte = [0];
        loop {
            match io::stdin().read(&mut byte) {
                Ok(1) => {
                    if tx.send(byte[0]).is_err() {
                        break;
                    }
                }
                _ => break,
            }
        }
    });
    rx
}

fn main() -> io::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        println!(
            "Usage:\n\
            - rv32emu <kernel.bin>\n\
            - rv32emu <kernel.bin> <fs.img>"
        );
        return Ok(());
    }

    let mut file = File::open(&args[1])?;
    let mut code = Vec::new();
    file.read_to_end(&mut code)?;

    let mut disk_image = Vec::new();
    if args.len() == 3 {
        let mut file_fs = File::open(&args[2])?;
        file_fs.read_to_end(&mut disk_image)?;
    }

    let mut cpu = Cpu::new(code, disk_image);
    let stdin = spawn_stdin_reader();
    let mut stdout = io::stdout();

    loop {
        if let Err(e) = cpu.step() {
            error!("fatal trap: {}", e);
            break;
        }

        let output = cpu.bus.uart.take_output();
        if !output.is_empty() {
            stdout.write_all(&output)?;
            stdout.flush()?;
        }

        if cpu.bus.uart.can_recv() {
            if let Ok(byte) = stdin.try_recv() {
                cpu.bus.uart.recv_byte(byte);
            }
        }
    }

    cpu.dump_registers();
    cpu.dump_csrs();
    cpu.dump_pc();
    Ok(())
}
