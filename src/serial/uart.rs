use std::time::Duration;

use esp_idf_svc::hal::{
    delay::TickType,
    gpio::{AnyIOPin, Gpio0, Gpio1},
    uart::{config, UartDriver, UartRxDriver, UartTxDriver, UART0, UART1},
    units::Hertz,
};

use super::channel::{ByteReader, ByteWriter, ChannelError};

const DEFAULT_BAUDRATE: u32 = 2_400;

/// Enums the different errors possible when working with the uart
#[derive(Debug)]
pub enum UARTError {
    DriverInstallError,
    InvalidPin,
    InvalidUartNumber,
}

/// Wrapper over the uart peripheral, configured as an 8N1 duplex link.
pub struct UART<'a> {
    driver: UartDriver<'a>,
}

/// Receiving half of a split [`UART`].
pub struct UartRx<'a> {
    driver: UartRxDriver<'a>,
}

/// Transmitting half of a split [`UART`].
pub struct UartTx<'a> {
    driver: UartTxDriver<'a>,
}

impl UART<'static> {
    /// Installs the driver for the given uart number on the given tx/rx
    /// pins. Fails when the uart number is not 0 or 1, when a pin number is
    /// not a valid gpio or when the driver cannot be installed.
    pub fn new(uart_number: usize, tx_pin: i32, rx_pin: i32) -> Result<UART<'static>, UARTError> {
        if !(0..=48).contains(&tx_pin) || !(0..=48).contains(&rx_pin) {
            return Err(UARTError::InvalidPin);
        }
        let tx_peripheral = unsafe { AnyIOPin::new(tx_pin) };
        let rx_peripheral = unsafe { AnyIOPin::new(rx_pin) };
        let config = config::Config::new()
            .baudrate(Hertz(DEFAULT_BAUDRATE))
            .data_bits(config::DataBits::DataBits8)
            .parity_none()
            .stop_bits(config::StopBits::STOP1)
            .flow_control(config::FlowControl::None);

        let driver = match uart_number {
            0 => UartDriver::new(
                unsafe { UART0::new() },
                tx_peripheral,
                rx_peripheral,
                Option::<Gpio0>::None,
                Option::<Gpio1>::None,
                &config,
            )
            .map_err(|_| UARTError::DriverInstallError)?,
            1 => UartDriver::new(
                unsafe { UART1::new() },
                tx_peripheral,
                rx_peripheral,
                Option::<Gpio0>::None,
                Option::<Gpio1>::None,
                &config,
            )
            .map_err(|_| UARTError::DriverInstallError)?,
            _ => return Err(UARTError::InvalidUartNumber),
        };

        Ok(UART { driver })
    }

    /// Splits the uart into its receiving and transmitting halves so each
    /// can be moved into its own task.
    pub fn into_split(self) -> (UartRx<'static>, UartTx<'static>) {
        let (tx, rx) = self.driver.into_split();
        (UartRx { driver: rx }, UartTx { driver: tx })
    }
}

impl<'a> ByteReader for UartRx<'a> {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, ChannelError> {
        self.driver
            .read(buf, TickType::from(timeout).0)
            .map_err(|_| ChannelError::ReadError)
    }
}

impl<'a> ByteWriter for UartTx<'a> {
    fn write(&mut self, bytes_to_write: &[u8]) -> Result<usize, ChannelError> {
        self.driver
            .write(bytes_to_write)
            .map_err(|_| ChannelError::WriteError)
    }

    fn wait_tx_done(&mut self, timeout: Duration) -> Result<(), ChannelError> {
        self.driver
            .wait_done(TickType::from(timeout).0)
            .map_err(|_| ChannelError::TxTimeout)
    }
}
